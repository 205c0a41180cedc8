//! BDD coverage for creating, restarting, and removing hosts.

mod bdd_steps;
mod scenarios;
mod test_helpers;
