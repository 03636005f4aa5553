pub mod catalog;
pub mod discovery;
pub mod region;
pub mod s57;
pub mod scheduled;

#[cfg(test)]
pub(crate) mod test_support;
