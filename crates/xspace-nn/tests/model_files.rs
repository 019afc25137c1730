//! File-level tests for the NNet and dataset loaders.

use std::io::Write;

use miette::Diagnostic;

use xspace_nn::{classification_label, Dataset, DatasetError, ModelError, NNet};

const TWO_CLASS: &str = "\
// 2 inputs, 2 hidden, 2 outputs
2,2,2,2,
2,2,2,
0,
-1.0,-1.0,
1.0,1.0,
0.0,0.0,0.0,
1.0,1.0,1.0,
1.0,0.0,
0.0,1.0,
0.0,
0.0,
1.0,-1.0,
-1.0,1.0,
0.0,
0.0,
";

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn loads_model_and_dataset_from_disk() {
    let model = write_temp(TWO_CLASS);
    let data = write_temp("a,b,class\n0.5,0.1,0\n0.1,0.5,1\n-0.5,-0.5,0\n");

    let net = NNet::from_file(model.path()).expect("model parses");
    let ds = Dataset::from_file(data.path()).expect("dataset parses");
    ds.check_feature_count(net.input_size()).expect("widths agree");

    let labels: Vec<usize> = ds
        .samples()
        .iter()
        .map(|s| classification_label(&net.compute_output(&s.values).expect("forward")))
        .collect();
    // relu zeroes both hidden nodes for the last sample: outputs tie, first wins
    assert_eq!(labels, vec![0, 1, 0]);
    assert_eq!(ds.correct_indices(&labels, None), vec![0, 1, 2]);
}

#[test]
fn missing_files_report_io_errors() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("absent.nnet");
    assert!(matches!(
        NNet::from_file(&missing),
        Err(ModelError::Io { .. })
    ));
    assert!(matches!(
        Dataset::from_file(dir.path().join("absent.csv")),
        Err(DatasetError::Io { .. })
    ));
}

#[test]
fn diagnostics_name_the_source_file() {
    let model = write_temp(&TWO_CLASS.replace("\n1.0,-1.0,\n", "\n1.0,x,\n"));
    let err = NNet::from_file(model.path()).expect_err("bad weight");
    let code = err.code().map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("xspace::nnet::syntax"));
    assert!(err.to_string().contains("line 13"));
}
