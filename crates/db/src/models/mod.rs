pub mod case;
pub mod customer;
pub mod technician;
