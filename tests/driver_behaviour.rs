//! Behavioural scenarios for the host driver lifecycle.

mod driver;
