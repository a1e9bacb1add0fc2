//! Opens a local HDF5 file and prints the shape, datatype, and first few
//! values of a named dataset.
//!
//! Usage: `cargo run --example read_dataset -- <path.h5> <dataset-path>`

use h5range::{Config, ReadRequest, Reader};

fn main() {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let file_path = args.next().unwrap_or_else(|| {
        eprintln!("usage: read_dataset <path.h5> <dataset-path>");
        std::process::exit(1);
    });
    let dataset_path = args.next().unwrap_or_else(|| "/".to_string());

    let reader = Reader::open_local(&file_path, Config::default()).expect("failed to open file");
    let results = reader.read_batch(&[ReadRequest {
        path: dataset_path.clone(),
        hyperslice: None,
    }]);

    match results.get(&dataset_path).expect("request not in result map") {
        Ok(dataset) => {
            println!("shape: {:?}", dataset.array.shape);
            println!("datatype: {:?}", dataset.array.datatype);
            println!("{} attribute(s)", dataset.attributes.len());
            let preview_bytes = dataset.array.values.len().min(64);
            println!("first {preview_bytes} bytes: {:?}", &dataset.array.values[..preview_bytes]);
        }
        Err(e) => {
            eprintln!("failed to read {dataset_path}: {e}");
            std::process::exit(1);
        }
    }
}
