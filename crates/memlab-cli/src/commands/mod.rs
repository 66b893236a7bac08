pub mod games;
pub mod init;
pub mod play;
