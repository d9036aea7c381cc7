//! Data store modules for Supabase integration

pub mod loadouts;
pub mod results;
pub mod supabase;

pub use loadouts::LoadoutStore;
pub use results::ResultStore;
pub use supabase::{SupabaseClient, SupabaseError};
