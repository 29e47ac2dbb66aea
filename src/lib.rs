//! Supperclub: REST backend for a peer-to-peer home-cooked meal marketplace.
//!
//! Hosts ("chefs") publish meals and paid events; other users ("foodies")
//! pay to join through Stripe checkout with the price split between the
//! platform and the chef's connected account. Participation is confirmed by
//! webhook, and foodies can take a partial refund inside a time window.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod payments;
