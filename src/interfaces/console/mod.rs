pub mod callback_reader;
pub mod presenter;
