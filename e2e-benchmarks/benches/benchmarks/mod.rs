pub mod hintbench;
