use std::{
    env,
    error::Error,
    ffi::OsString,
    fs::File,
    io::{BufWriter, Write},
};

use blockpress::*;

#[cfg(feature = "std")]
fn parse_method(method: &str) -> Option<CompressOptions> {
    let (method, diff_filter) = match method.strip_suffix("+dif") {
        Some(method) => (method, true),
        None => (method, false),
    };

    let mut opts = CompressOptions {
        diff_filter,
        ..Default::default()
    };
    match method {
        "none" => opts.kind = CompressionType::None,
        "rl" => opts.kind = CompressionType::Rl,
        "lz" | "lzx" | "lz-better" | "lzx-better" => {
            opts.kind = CompressionType::Lz {
                extended: method.starts_with("lzx"),
            };
            if method.ends_with("-better") {
                opts.lz_parse = LzParse::Better;
            }
        }
        "huff4" => opts.kind = CompressionType::Huffman { four_bit: true },
        "huff8" => opts.kind = CompressionType::Huffman { four_bit: false },
        "fastlz" => opts.kind = CompressionType::FastLz,
        "fastlz1" | "fastlz2" => {
            opts.kind = CompressionType::FastLz;
            opts.fastlz_level = if method == "fastlz1" {
                CompressionLevel::Level1
            } else {
                CompressionLevel::Level2
            };
        }
        _ => return None,
    }
    Some(opts)
}

#[cfg(feature = "std")]
fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<OsString> = env::args_os().collect();
    let prog = args
        .first()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_default();
    let usage = || {
        println!("Usage: {} c <method> input output", prog);
        println!("       {} d input output", prog);
        println!("Methods: none rl lz lzx lz-better lzx-better huff4 huff8 fastlz fastlz1 fastlz2");
        println!("         (append +dif to delta-filter first)");
    };

    let (outp_fn, outp) = match args.get(1).and_then(|m| m.to_str()) {
        Some("c") if args.len() >= 5 => {
            let method = args[2].to_string_lossy();
            let Some(opts) = parse_method(&method) else {
                println!("Invalid method {}", method);
                return Ok(());
            };
            let inp = std::fs::read(&args[3])?;
            let outp = compress_to_vec(&inp, &opts)?;
            println!(
                "{} -> {} bytes ({:?})",
                inp.len(),
                outp.len(),
                get_compression_type(&outp)?
            );
            (&args[4], outp)
        }
        Some("d") if args.len() >= 4 => {
            let inp = std::fs::read(&args[2])?;
            (&args[3], uncompress_to_vec(&inp)?)
        }
        _ => {
            usage();
            return Ok(());
        }
    };

    let mut outp_f = BufWriter::new(File::create(outp_fn)?);
    outp_f.write_all(&outp)?;
    outp_f.flush()?;

    Ok(())
}

#[cfg(not(feature = "std"))]
fn main() {
    println!("Demo requires std feature");
}
