pub mod fps_counter;
pub mod loop_state;
