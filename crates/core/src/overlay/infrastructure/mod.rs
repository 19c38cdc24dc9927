pub mod overlay_scene;
