mod network;
pub(crate) mod toolkit;
