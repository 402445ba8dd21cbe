//! The C ABI spoken between the `exploder` bootstrap and the libraries packaged
//! inside its archive.
//!
//! A packaged library exports a single symbol, [`EXPORTS_SYMBOL`], which returns
//! a pointer to a static [`ExportTable`]. Each [`Export`] in the table pairs a
//! fully qualified name with a function pointer and a kind tag, so the
//! bootstrap can tell an entry point apart from anything else sharing its name.
//!
//! Libraries build their table with [`export_table!`] and publish it with
//! [`export_library!`]:
//!
//! ```ignore
//! fn start(args: &[String]) -> Result<(), exploder_abi::guest::BoxError> {
//!     println!("started with {:?}", args);
//!     Ok(())
//! }
//!
//! exploder_abi::export_table! {
//!     pub static EXPORTS = {
//!         "demo.Start" => start,
//!     };
//! }
//!
//! exploder_abi::export_library!(EXPORTS);
//! ```

use std::ffi::c_void;
use std::marker::PhantomData;

pub mod guest;

/// Bumped whenever the layout of any type in this crate changes.
pub const ABI_VERSION: u32 = 1;

/// Nul-terminated name of the function every packaged library exports.
pub const EXPORTS_SYMBOL: &[u8] = b"exploder_exports_v1\0";

/// Kind tag for an entry point: takes the argument list, returns a [`Status`].
pub const KIND_MAIN: u32 = 1;

pub type RawFn = unsafe extern "C" fn();
pub type MainFn = unsafe extern "C" fn(args: RawArgs<'_>, reporter: Reporter<'_>) -> Status;
pub type ExportsFn = unsafe extern "C" fn() -> *const ExportTable;

/// A borrowed byte string passed across the library boundary.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawStr<'a> {
    ptr: *const u8,
    len: usize,
    _marker: PhantomData<&'a [u8]>,
}

unsafe impl Send for RawStr<'_> {}
unsafe impl Sync for RawStr<'_> {}

impl<'a> RawStr<'a> {
    pub const fn new(value: &'a str) -> RawStr<'a> {
        RawStr {
            ptr: value.as_ptr(),
            len: value.len(),
            _marker: PhantomData,
        }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        if self.len == 0 {
            return &[];
        }
        // A `RawStr` is only ever built from a live `&'a str`.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl std::fmt::Debug for RawStr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}

/// The argument list handed to an entry point, in invocation order.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawArgs<'a> {
    ptr: *const RawStr<'a>,
    len: usize,
    _marker: PhantomData<&'a [RawStr<'a>]>,
}

impl<'a> RawArgs<'a> {
    pub fn new(args: &'a [RawStr<'a>]) -> RawArgs<'a> {
        RawArgs {
            ptr: args.as_ptr(),
            len: args.len(),
            _marker: PhantomData,
        }
    }

    pub fn as_slice(&self) -> &'a [RawStr<'a>] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Result of an entry point call.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(pub i32);

impl Status {
    pub const OK: Status = Status(0);
    pub const FAILED: Status = Status(1);

    #[inline(always)]
    pub fn is_ok(self) -> bool {
        self == Status::OK
    }
}

/// Callback through which an entry point hands its failure diagnostic back to
/// the bootstrap. Reports are appended in the order they are made.
#[repr(C)]
pub struct Reporter<'a> {
    ctx: *mut c_void,
    report: unsafe extern "C" fn(ctx: *mut c_void, message: RawStr<'_>),
    _marker: PhantomData<&'a mut String>,
}

impl<'a> Reporter<'a> {
    /// A reporter that appends every report to `buffer`.
    pub fn collecting(buffer: &'a mut String) -> Reporter<'a> {
        Reporter {
            ctx: buffer as *mut String as *mut c_void,
            report: append_to_string,
            _marker: PhantomData,
        }
    }

    pub fn report(&self, message: &str) {
        unsafe { (self.report)(self.ctx, RawStr::new(message)) }
    }
}

unsafe extern "C" fn append_to_string(ctx: *mut c_void, message: RawStr<'_>) {
    let buffer = unsafe { &mut *(ctx as *mut String) };
    if !buffer.is_empty() && !buffer.ends_with('\n') {
        buffer.push('\n');
    }
    buffer.push_str(&String::from_utf8_lossy(message.as_bytes()));
}

/// A named function exported by a library.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Export {
    name: RawStr<'static>,
    kind: u32,
    func: Option<RawFn>,
}

impl Export {
    pub const fn main(name: &'static str, func: MainFn) -> Export {
        Export {
            name: RawStr::new(name),
            kind: KIND_MAIN,
            func: Some(unsafe { std::mem::transmute::<MainFn, RawFn>(func) }),
        }
    }

    /// An export of an arbitrary kind. The bootstrap only invokes [`KIND_MAIN`].
    pub const fn raw(name: &'static str, kind: u32, func: Option<RawFn>) -> Export {
        Export {
            name: RawStr::new(name),
            kind,
            func,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &[u8] {
        self.name.as_bytes()
    }

    #[inline(always)]
    pub fn kind(&self) -> u32 {
        self.kind
    }

    /// The function as an entry point, if it has the entry point shape.
    pub fn as_main(&self) -> Option<MainFn> {
        if self.kind != KIND_MAIN {
            return None;
        }
        self.func
            .map(|func| unsafe { std::mem::transmute::<RawFn, MainFn>(func) })
    }
}

impl std::fmt::Debug for Export {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Export")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("func", &self.func.is_some())
            .finish()
    }
}

/// The table a library publishes through [`EXPORTS_SYMBOL`].
#[repr(C)]
pub struct ExportTable {
    abi_version: u32,
    exports: *const Export,
    len: usize,
}

unsafe impl Sync for ExportTable {}

impl ExportTable {
    pub const fn new(exports: &'static [Export]) -> ExportTable {
        Self::versioned(ABI_VERSION, exports)
    }

    /// A table claiming `abi_version`. Libraries use [`ExportTable::new`].
    pub const fn versioned(abi_version: u32, exports: &'static [Export]) -> ExportTable {
        ExportTable {
            abi_version,
            exports: exports.as_ptr(),
            len: exports.len(),
        }
    }

    #[inline(always)]
    pub fn abi_version(&self) -> u32 {
        self.abi_version
    }

    pub fn exports(&self) -> &[Export] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.exports, self.len) }
    }

    /// The first export named `name`.
    pub fn find(&self, name: &str) -> Option<&Export> {
        self.exports()
            .iter()
            .find(|export| export.name() == name.as_bytes())
    }
}

impl std::fmt::Debug for ExportTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportTable")
            .field("abi_version", &self.abi_version)
            .field("exports", &self.exports())
            .finish()
    }
}

/// Declares a static [`ExportTable`] whose entries are entry points.
///
/// Each function must have the shape `fn(&[String]) -> Result<(), E>` where
/// `E: Into<guest::BoxError>`. Errors and panics are caught on the library's
/// side of the boundary and reported back to the bootstrap.
#[macro_export]
macro_rules! export_table {
    ($vis:vis static $table:ident = { $($name:literal => $main:path),* $(,)? };) => {
        $vis static $table: $crate::ExportTable = {
            const EXPORTS: &[$crate::Export] = &[
                $(
                    {
                        unsafe extern "C" fn trampoline(
                            args: $crate::RawArgs<'_>,
                            reporter: $crate::Reporter<'_>,
                        ) -> $crate::Status {
                            $crate::guest::run_main($main, args, reporter)
                        }
                        $crate::Export::main($name, trampoline)
                    }
                ),*
            ];
            $crate::ExportTable::new(EXPORTS)
        };
    };
}

/// Publishes a table declared with [`export_table!`] under [`EXPORTS_SYMBOL`].
/// Use once per library.
#[macro_export]
macro_rules! export_library {
    ($table:path) => {
        #[no_mangle]
        pub extern "C" fn exploder_exports_v1() -> *const $crate::ExportTable {
            &$table
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(_args: &[String]) -> Result<(), guest::BoxError> {
        Ok(())
    }

    fn second(_args: &[String]) -> Result<(), guest::BoxError> {
        Err("second failed".into())
    }

    export_table! {
        static TABLE = {
            "app.First" => first,
            "app.Second" => second,
        };
    }

    static EMPTY: ExportTable = ExportTable::new(&[]);

    #[test]
    fn table_lists_exports_in_declaration_order() {
        assert_eq!(TABLE.abi_version(), ABI_VERSION);
        let names: Vec<_> = TABLE.exports().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec![&b"app.First"[..], &b"app.Second"[..]]);
    }

    #[test]
    fn find_matches_whole_names_only() {
        assert!(TABLE.find("app.First").is_some());
        assert!(TABLE.find("app.Firs").is_none());
        assert!(TABLE.find("app.First.x").is_none());
        assert!(EMPTY.find("app.First").is_none());
    }

    #[test]
    fn only_main_exports_are_callable() {
        let export = TABLE.find("app.Second").unwrap();
        assert_eq!(export.kind(), KIND_MAIN);
        assert!(export.as_main().is_some());

        let data = Export::raw("app.Data", 7, None);
        assert!(data.as_main().is_none());

        let missing = Export::raw("app.Missing", KIND_MAIN, None);
        assert!(missing.as_main().is_none());
    }

    #[test]
    fn call_through_table_reports_errors() {
        let main = TABLE.find("app.Second").unwrap().as_main().unwrap();
        let args: Vec<RawStr<'_>> = Vec::new();
        let mut trace = String::new();
        let status = unsafe { main(RawArgs::new(&args), Reporter::collecting(&mut trace)) };
        assert_eq!(status, Status::FAILED);
        assert!(trace.contains("second failed"), "{}", trace);
    }

    #[test]
    fn reporter_separates_reports_by_line() {
        let mut buffer = String::new();
        {
            let reporter = Reporter::collecting(&mut buffer);
            reporter.report("one");
            reporter.report("two");
        }
        assert_eq!(buffer, "one\ntwo");
    }

    #[test]
    fn raw_args_round_trip_borrowed_strings() {
        let owned = vec!["a".to_string(), String::new(), "ünïcode".to_string()];
        let raw: Vec<RawStr<'_>> = owned.iter().map(|s| RawStr::new(s)).collect();
        let args = RawArgs::new(&raw);
        assert_eq!(args.len(), 3);
        let back: Vec<String> = args.as_slice().iter().map(|s| s.to_string_lossy()).collect();
        assert_eq!(back, owned);
    }

    #[test]
    fn exports_symbol_is_nul_terminated() {
        assert_eq!(EXPORTS_SYMBOL.last(), Some(&0));
        assert_eq!(&EXPORTS_SYMBOL[..EXPORTS_SYMBOL.len() - 1], b"exploder_exports_v1");
    }
}
