use bitstream_reader::BitStreamReader;

const SIB_MAGIC: [u8; 4] = [0xE2, 0x9C, 0xA8, 0x0E];
const LLVM_MAGIC: [u8; 4] = [b'B', b'C', 0xC0, 0xDE];

fn main() {
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .expect("Provide file path to a .sib or .bc file");
    let strict = args.any(|arg| arg == "--strict");
    let file = std::fs::read(&path).unwrap();

    let Some((magic, stream)) = file.split_first_chunk::<4>() else {
        eprintln!("{path}: file is too short");
        std::process::exit(1);
    };
    if *magic != SIB_MAGIC && *magic != LLVM_MAGIC {
        eprintln!("{path}: incorrect magic {magic:02x?}");
        std::process::exit(1);
    }

    match BitStreamReader::new(stream)
        .verify_block_lengths(strict)
        .parse()
    {
        Ok(root) => print!("{root}"),
        Err(err) => {
            eprintln!("{path}: {err}");
            std::process::exit(1);
        }
    }
}
