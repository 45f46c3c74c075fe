/// Writers from the scene IR back into the canonical container
pub mod glb_exporter;
