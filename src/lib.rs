#![allow(non_snake_case)]

// Базовые модули
pub mod consts;
pub mod config;
pub mod lock;
pub mod desc;

// Формат страниц и блочный менеджер
pub mod page;   // src/page/{mod,common,checksum,disk}.rs
pub mod block;  // src/block/{mod,core,io,addr,rw}.rs
pub mod free;   // src/free/mod.rs

// Salvage: start / next / end
pub mod salvage;

// Удобные реэкспорты
pub use block::{addr_decode, addr_to_vec, Block};
pub use config::SalvageConfig;
pub use free::{ExtentList, FreeTracker};
pub use salvage::{RejectReason, Salvage, SalvageNext, SalvagePage, SalvageStats};
