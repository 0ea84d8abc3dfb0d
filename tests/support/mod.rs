pub mod course_server;
pub mod socket_guard;
