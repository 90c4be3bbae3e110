//! CRM clients for attendee resolution.
//!
//! Two incompatible API generations are supported behind the [`PrimaryCrm`]
//! and [`LegacyCrm`] traits. Clients only classify responses into
//! [`morningbrief_shared::BriefError`]; retries and tier fallback live in the
//! resolver.

pub mod fields;
pub mod legacy;
pub mod primary;

pub use fields::{CrmField, FieldDef, SocialMatch, SocialMatcher};
pub use legacy::{LegacyCrm, LegacyCrmClient, LegacyPerson, legacy_social_url};
pub use primary::{NOTE_EXCERPT_CHARS, PrimaryCrm, PrimaryCrmClient, PrimaryPerson, note_excerpt};
