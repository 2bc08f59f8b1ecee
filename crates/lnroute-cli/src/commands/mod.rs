pub mod feedback;
pub mod getroutes;
pub mod inform;
pub mod init;
pub mod layer;
pub mod reserve;
pub mod status;
