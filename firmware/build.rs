// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! This build script writes `memory.x` into a directory where the linker can
//! always find it at build time, which a workspace member needs.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// nRF52805 flash and RAM. The bridge runs without a SoftDevice or bootloader.
const FLASH_SIZE_K: u32 = 192;
const RAM_SIZE_K: u32 = 24;

fn main() {
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());

    let memory_x_content = format!(
        r##"
        MEMORY
        {{
            /* NOTE 1 K = 1 KiBi = 1024 bytes */
            FLASH (rx) : ORIGIN = 0x00000000, LENGTH = {}K
            RAM : ORIGIN = 0x20000000, LENGTH = {}K
        }}
        "##,
        FLASH_SIZE_K, RAM_SIZE_K
    );
    File::create(out.join("./memory.x"))
        .unwrap()
        .write_all(memory_x_content.as_bytes())
        .unwrap();

    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed=build.rs");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
