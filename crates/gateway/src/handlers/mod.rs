//! API handlers module

pub mod health;
pub mod participants;
pub mod qr;
pub mod submissions;
pub mod uploads;
pub mod withdrawals;
