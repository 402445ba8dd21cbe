//! Loads the built demo library the way the bootstrap does in production.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};

use exploder::{
    DylibLoader, Error, ErrorKind, InvocationResult, IsolatedEnvironment, LoadError, Loader,
    Module,
};

/// The demo cdylib sits next to this test binary (in `deps/`) and is
/// uplifted one level above it.
fn demo_library() -> PathBuf {
    let name = format!("{}exploder_demo{}", DLL_PREFIX, DLL_SUFFIX);
    let exe = std::env::current_exe().unwrap();
    exe.ancestors()
        .skip(1)
        .take(2)
        .map(|dir| dir.join(&name))
        .find(|path| path.is_file())
        .unwrap_or_else(|| panic!("{} was not built next to {}", name, exe.display()))
}

/// A private copy, as the bootstrap loads libraries from its workspace.
fn copy_into(dir: &Path, name: &str) -> PathBuf {
    let target = dir.join(name);
    std::fs::copy(demo_library(), &target).unwrap();
    target
}

#[test]
fn loads_the_export_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = copy_into(dir.path(), &format!("demo{}", DLL_SUFFIX));

    let module = DylibLoader.load(&path).map_err(|e| e.to_string()).unwrap();
    let exports = module.exports();
    assert_eq!(exports.abi_version(), exploder_abi::ABI_VERSION);
    assert!(exports.find("demo.Hello").and_then(|e| e.as_main()).is_some());
    assert!(exports.find("demo.Cat").and_then(|e| e.as_main()).is_some());
    assert!(exports.find("demo.Missing").is_none());

    module.close().unwrap();
}

#[test]
fn resolves_and_invokes_through_the_environment() {
    let dir = tempfile::tempdir().unwrap();
    let library = copy_into(dir.path(), &format!("demo{}", DLL_SUFFIX));
    let data = dir.path().join("data.txt");
    std::fs::write(&data, b"printed by demo.Cat\n").unwrap();

    let mut env = IsolatedEnvironment::build(vec![library.clone()], DylibLoader);
    {
        let entry = env.resolve("demo.Hello").unwrap();
        assert_eq!(entry.origin(), library);
        let result = entry.invoke(&["Ferris".to_string()]);
        assert_eq!(result, InvocationResult::Completed);
    }
    {
        let entry = env.resolve("demo.Cat").unwrap();
        let result = entry.invoke(&[data.to_string_lossy().into_owned()]);
        assert_eq!(result, InvocationResult::Completed);
    }
    assert_eq!(env.loaded(), 1);
    env.close();
}

#[test]
fn guest_failures_come_back_as_traces() {
    let dir = tempfile::tempdir().unwrap();
    let library = copy_into(dir.path(), &format!("demo{}", DLL_SUFFIX));
    let missing = dir.path().join("missing.txt");

    let mut env = IsolatedEnvironment::build(vec![library], DylibLoader);
    let entry = env.resolve("demo.Cat").unwrap();
    match entry.invoke(&[missing.to_string_lossy().into_owned()]) {
        InvocationResult::Failed(failure) => {
            assert_eq!(failure.entry_point, "demo.Cat");
            assert!(failure.trace.contains("Could not read"), "{}", failure.trace);
            assert!(failure.trace.contains("Caused by:"), "{}", failure.trace);
        }
        other => panic!("expected a failure, got {:?}", other),
    }
    env.close();
}

#[test]
fn unknown_names_and_broken_libraries_fail_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let library = copy_into(dir.path(), &format!("demo{}", DLL_SUFFIX));
    let broken = dir.path().join(format!("broken{}", DLL_SUFFIX));
    std::fs::write(&broken, b"not a shared library").unwrap();

    let mut env = IsolatedEnvironment::build(vec![library.clone()], DylibLoader);
    let err = env.resolve("demo.Nowhere").unwrap_err();
    assert!(matches!(err, Error::EntryPointNotFound { searched: 1, .. }));
    env.close();

    let mut env = IsolatedEnvironment::build(vec![broken, library], DylibLoader);
    let err = env.resolve("demo.Hello").unwrap_err();
    assert!(matches!(
        err,
        Error::LoadLibrary {
            source: LoadError::Open(_),
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Resolution);
}
