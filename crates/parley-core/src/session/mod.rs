//! Client-side session state: optimistic view and request reconciliation.

pub mod controller;
