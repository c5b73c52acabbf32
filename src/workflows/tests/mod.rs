mod common;
mod digest;
mod export;
mod health;
mod status;
