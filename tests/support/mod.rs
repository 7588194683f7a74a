pub mod scripted_server;
pub mod socket_guard;
