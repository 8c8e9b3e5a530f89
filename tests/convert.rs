//! End-to-end conversion over a small on-disk recipe tree.

use std::fs;
use std::path::Path;

use camino::Utf8Path;

use bionix::report::{self, Status};
use bionix::{LoadOptions, Tables, convert_batch, load_all};

fn write_recipe(root: &Path, name: &str, meta: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("meta.yaml"), meta).unwrap();
}

fn utf8(path: &Path) -> &Utf8Path {
    Utf8Path::from_path(path).unwrap()
}

const PYSCAF: &str = concat!(
    "{% set version = \"0.4.1\" %}\n",
    "package:\n",
    "  name: pyscaf\n",
    "  version: {{ version }}\n",
    "source:\n",
    "  url: https://example.org/pyscaf-{{ version }}.tar.gz\n",
    "  sha256: 9f2a77f1b1a8c4e\n",
    "requirements:\n",
    "  run:\n",
    "    - python >=3.6\n",
    "    - numpy\n",
    "build:\n",
    "  script: pip install .\n",
    "about:\n",
    "  summary: Scaffolding helper\n",
    "  home: https://example.org/pyscaf\n",
);

const OLDTOOL: &str = concat!(
    "package:\n",
    "  name: oldtool\n",
    "  version: 0.9\n",
    "source:\n",
    "  url: https://example.org/oldtool-0.9.tar.gz\n",
    "  md5: 5d41402abc4b2a76\n",
    "build:\n",
    "  script:\n",
    "    - make\n",
    "    - make install\n",
    "about:\n",
    "  summary: A tool from before sha256\n",
    "  home: https://example.org/oldtool\n",
);

const ORPHAN: &str = concat!(
    "package:\n",
    "  name: orphan\n",
    "  version: 1.0\n",
    "source:\n",
    "  url: https://example.org/orphan-1.0.tar.gz\n",
    "  sha256: abcdef\n",
    "requirements:\n",
    "  run:\n",
    "    - libdoesnotexist >=2.0\n",
    "build:\n",
    "  script:\n",
    "    - make install\n",
    "about:\n",
    "  summary: Depends on nothing anyone provides\n",
    "  home: https://example.org/orphan\n",
);

#[test]
fn test_convert_tree_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let recipes_dir = tmp.path().join("recipes");
    let outdir = tmp.path().join("nixpkgs");
    fs::create_dir_all(&outdir).unwrap();

    write_recipe(&recipes_dir, "pyscaf", PYSCAF);
    write_recipe(&recipes_dir, "oldtool", OLDTOOL);
    write_recipe(&recipes_dir, "orphan", ORPHAN);

    let loaded = load_all(utf8(&recipes_dir), &LoadOptions::default()).unwrap();
    assert_eq!(loaded.recipes.len(), 3);
    assert!(loaded.failures.is_empty());

    let outcome = convert_batch(&loaded.recipes, utf8(&outdir), Tables::builtin());

    // The pip install recipe renders as a Python package, without a
    // companion build script.
    assert_eq!(outcome.status["pyscaf"], Status::Ok);
    let derivation = fs::read_to_string(outdir.join("pyscaf/default.nix")).unwrap();
    assert!(derivation.contains("buildPythonPackage"));
    assert!(derivation.contains("python3"));
    assert!(derivation.contains("numpy"));
    assert!(derivation.contains("version = \"0.4.1\""));
    assert!(!outdir.join("pyscaf/build.sh").exists());

    // The md5-only recipe is blocked and produces no usable output.
    assert_eq!(outcome.status["oldtool"], Status::Md5Only);
    assert!(!outdir.join("oldtool/default.nix").exists());

    // The unsatisfiable dependency shows up in the tally.
    assert_eq!(outcome.status["orphan"], Status::MissingDep);
    assert_eq!(outcome.missing["libdoesnotexist"], 1);

    report::write_all_packages(utf8(&outdir), &outcome).unwrap();
    report::write_status_report(utf8(&outdir), &outcome).unwrap();
    report::write_missing_report(utf8(&outdir), &outcome).unwrap();

    let all = fs::read_to_string(outdir.join("all-packages.nix")).unwrap();
    assert!(all.starts_with("with (import <nixpkgs> {});"));
    assert!(all.contains("pyscaf = pkgs.callPackage ./pyscaf { };"));
    assert!(!all.contains("oldtool"));
    assert!(!all.contains("orphan"));

    let status = fs::read_to_string(outdir.join("package-status.tsv")).unwrap();
    assert!(status.contains("pyscaf\tOK\n"));
    assert!(status.contains("oldtool\tMD5-ONLY\n"));
    assert!(status.contains("orphan\tMISSING-DEP\n"));

    let missing = fs::read_to_string(outdir.join("missing-dependencies.tsv")).unwrap();
    assert!(missing.contains("libdoesnotexist\t1\n"));
}
