pub mod sqlite;

pub use sqlite::{SocietyTx, SqliteSociety};

#[cfg(test)]
mod tests;
