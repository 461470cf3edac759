use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const PRIV0: &str = "ef4fc6cfd682494093bbadf041ba4341afbe22b224432e21a4bc4470c5b939d4";
const PRIV1: &str = "123f37eb9a7f24a120969a1b2d6ac4859fb8080cfc2e8d703abae0f44305fc12";
const PUB0: &str = "03820317ad251bca573c8fda2b8f26ffc9aae9d5ecb15b50ee08d8f9e009def38e";
const PUB1: &str = "0238de8c9eb2842ecaf0cc61ee6ba23fe4e46f1cfd82eac0910e1d8e865bd76df9";

const UNSIGNED_TXID: &str = "1e7a98206ba49f6745931febf89f28d00d5c0decdd790dc7d0bcc789e98bff98";
const SIGNED_P2SH: &str = "010000000162be60c1cdbd6b44167d8460756f04feb65ba7bd969ef825a174f576970bd84a01000000d900473044022009143b07279ef6d5317865672e9fc28ada31314abf242ae786917b92cf027ac002207544d055f2b8bb249dc0294d565c6d538f4e04f9b142331fa103d82e0498a181014730440220561f9c23560c6d994c666b9b327f3ef1d9c0b29d0404396d1d6c7a86fc45fc7d02201909041cbe02fc9367f8ce019278629e3f8eae9b7a33fc8223e6fa89e368bd810147522103820317ad251bca573c8fda2b8f26ffc9aae9d5ecb15b50ee08d8f9e009def38e210238de8c9eb2842ecaf0cc61ee6ba23fe4e46f1cfd82eac0910e1d8e865bd76df952aeffffffff01f0a29a3b0000000017a914c99a494597ade09b5194f9ec8e02d96607ae64798700000000";

fn cli(args: &[&str]) -> Output {
    let binary_path = assert_cmd::cargo::cargo_bin!("blockio-signer");
    Command::new(binary_path)
        .args(args)
        .env_remove("BLOCK_IO_PIN")
        .output()
        .expect("cli runs")
}

fn stdout_json(output: &Output) -> Value {
    assert!(output.status.success(), "cli exited unsuccessfully: {:?}", output);
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout is utf8");
    serde_json::from_str(&stdout).expect("stdout is valid json")
}

fn write_prepared(dir: &TempDir, expected_unsigned_txid: &str) -> PathBuf {
    let prepared = json!({
        "status": "success",
        "data": {
            "network": "LTCTEST",
            "tx_type": "basic",
            "inputs": [{
                "input_index": 0,
                "previous_txid": "4ad80b9776f574a125f89e96bda75bb6fe046f7560847d16446bbdcdc160be62",
                "previous_output_index": 1,
                "input_value": "10.00000000",
                "spending_address": "QPZMy7ivpYdkJRLhtTx7tj5Fa4doQ2auWk"
            }],
            "outputs": [{
                "output_index": 0,
                "output_category": "user-specified",
                "output_value": "9.99990000",
                "receiving_address": "QeyxkrKbgKvxbBY1HLiBYjMnZx1HDRMYmd"
            }],
            "input_address_data": [{
                "address": "QPZMy7ivpYdkJRLhtTx7tj5Fa4doQ2auWk",
                "address_type": "P2SH",
                "public_keys": [PUB0, PUB1],
                "required_signatures": 2
            }],
            "expected_unsigned_txid": expected_unsigned_txid
        }
    });

    let path = dir.path().join("prepared.json");
    fs::write(&path, serde_json::to_string_pretty(&prepared).unwrap()).unwrap();
    path
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf8 temp path")
}

#[test]
fn cli_stretches_pin_with_legacy_defaults() {
    let out = stdout_json(&cli(&["stretch", "--pin", "123456"]));
    assert_eq!(
        out["key"],
        "d0478c395b66e588a1518cdd08d8257aa2145a4c20bcd05c466afb334b7d18e7"
    );
}

#[test]
fn cli_derives_public_keys() {
    let out = stdout_json(&cli(&[
        "pubkey",
        "--secret",
        "6b0e34587dece0ef042c4c7205ce6b3d4a64d0bc484735b9325f7971a0ead963",
    ]));
    assert_eq!(
        out["public_key"],
        "029c06f988dc6b44696e002e8abf496a13c73c2f1db3bde2dfb69be129f3711b01"
    );

    let out = stdout_json(&cli(&["pubkey", "--passphrase", "deadbeeffeedface"]));
    assert_eq!(
        out["public_key"],
        "029023d9738c623cdd7e5fdd0f41666accb82f21df5d27dc5ef07040f7bdc5d9f5"
    );
}

#[test]
fn cli_rejects_conflicting_key_sources() {
    let output = cli(&["pubkey", "--secret", PRIV0, "--passphrase", "deadbeef"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exactly one"), "stderr: {}", stderr);
}

#[test]
fn cli_signs_prepared_transaction() {
    let dir = TempDir::new().unwrap();
    let prepared = write_prepared(&dir, UNSIGNED_TXID);

    let out = stdout_json(&cli(&[
        "sign",
        "--prepared",
        path_arg(&prepared),
        "--key",
        PRIV1,
        "--key",
        PRIV0,
    ]));
    assert_eq!(out["tx_type"], "basic");
    assert_eq!(out["tx_hex"], SIGNED_P2SH);
    assert!(out.get("signatures").map_or(true, Value::is_null));
}

#[test]
fn cli_partial_signing_lists_signatures() {
    let dir = TempDir::new().unwrap();
    let prepared = write_prepared(&dir, UNSIGNED_TXID);

    let out = stdout_json(&cli(&["sign", "--prepared", path_arg(&prepared), "--key", PRIV0]));
    let sigs = out["signatures"].as_array().expect("signatures listed");
    assert_eq!(sigs.len(), 1);
    assert_eq!(sigs[0]["input_index"], 0);
    assert_eq!(sigs[0]["public_key"], PUB0);
}

#[test]
fn cli_refuses_mismatched_unsigned_txid() {
    let dir = TempDir::new().unwrap();
    let prepared = write_prepared(
        &dir,
        "0000000000000000000000000000000000000000000000000000000000000000",
    );

    let output = cli(&["sign", "--prepared", path_arg(&prepared), "--key", PRIV0, "--key", PRIV1]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn cli_summarizes_prepared_transaction() {
    let dir = TempDir::new().unwrap();
    let prepared = write_prepared(&dir, UNSIGNED_TXID);

    let out = stdout_json(&cli(&["summarize", "--prepared", path_arg(&prepared)]));
    assert_eq!(out["network"], "LTCTEST");
    assert_eq!(out["network_fee"], "0.00010000");
    assert_eq!(out["blockio_fee"], "0.00000000");
    assert_eq!(out["total_amount_to_send"], "9.99990000");
}
