pub mod capture_loop;
pub mod no_show_loop;
pub mod worker_loop;
