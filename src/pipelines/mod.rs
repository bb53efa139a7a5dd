pub mod hsp_runner;
