mod checks;
mod fixture;

pub use checks::assert_vault_invariants;
pub use fixture::TestVault;
