#![forbid(unsafe_code)]

pub mod recording;


mod scheduler_contract;
