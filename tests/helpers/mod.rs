#![allow(dead_code)]

pub mod analyzers;
