pub mod contact_cache;
pub mod group_cache;

pub use contact_cache::ContactLookupCache;
pub use group_cache::GroupMetadataCache;
