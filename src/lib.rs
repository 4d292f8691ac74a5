// Ensure each result error is either handled or returned
#![deny(unused_must_use)]
#![allow(clippy::missing_safety_doc)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate log;
#[macro_use]
extern crate num_derive;

pub mod class;
pub mod dex;
pub mod instruction;
pub mod jvm;
pub mod runtime;

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

pub fn read_file(path: &str) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;

    // Use seek to get length of file
    let length = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;

    let mut data = Vec::with_capacity(length as usize);
    file.read_to_end(&mut data)?;

    Ok(data)
}
