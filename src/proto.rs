include!(concat!(env!("OUT_DIR"), "/proto/mod.rs"));
