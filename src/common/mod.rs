pub mod generic_key;
