// handlers/mod.rs - Handler tiers
//
// Public (no identity required) → Protected (authenticated subject required)
//
// Every request already carries an Identity attached by the authentication
// middleware; the tiers differ only in whether they demand a subject.
pub mod protected; // /profiles, /addresses
pub mod public;    // /health, /profiles/pictures/:file
