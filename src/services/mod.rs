pub mod file_service;
pub mod note_service;
pub mod object_storage;
