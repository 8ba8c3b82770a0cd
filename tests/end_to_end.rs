#![cfg(unix)]

use office_bridge::{
    config::Config,
    error::ErrorKind,
    pipeline::Pipeline,
    settings::{self, BackendConfig, BackendKind},
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

// Fake executables are written and then spawned; running these tests one at a
// time keeps a concurrent fork from holding a script open for writing.
static SERIAL: Mutex<()> = Mutex::new(());

const FAKE_SOFFICE: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
outdir=""; fmt=""; input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --convert-to) fmt="$2"; shift 2 ;;
    --outdir) outdir="$2"; shift 2 ;;
    --*) shift ;;
    *) input="$1"; shift ;;
  esac
done
name=$(basename "$input")
stem="${name%.*}"
printf 'pdf from %s' "$name" > "$outdir/$stem.$EXT_CASE"
"#;

const FAKE_POWERSHELL: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
script=""; output=""
while [ $# -gt 0 ]; do
  case "$1" in
    -File) script="$2"; shift 2 ;;
    -OutputPath) output="$2"; shift 2 ;;
    *) shift ;;
  esac
done
[ -f "$script" ] && echo "script-present" >> "$(dirname "$0")/calls.log"
printf 'converted' > "$output"
echo '{"ok":true,"error":null,"stage":null}'
"#;

const FAKE_PYTHON: &str = r#"#!/bin/sh
output=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) output="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf 'docx body' > "$output"
echo '{"ok":true,"error":null,"stage":null}'
"#;

struct Fixture {
    tmp: TempDir,
    cfg: Config,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.paths.backend_record = tmp.path().join("record/config.json").display().to_string();
        cfg.paths.scratch_dir = tmp.path().join("scratch").display().to_string();
        cfg.moves.delay_ms = 1;
        cfg.headless.timeout_seconds = 30;
        cfg.automation.timeout_seconds = 30;
        cfg.pdf2docx.timeout_seconds = 30;
        Self { tmp, cfg }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.tmp.path().join(rel)
    }

    fn exe(&self, name: &str, body: &str) -> PathBuf {
        let dir = self.path("bin");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn configure(&self, api_path: &Path, kind: BackendKind) {
        let backend = BackendConfig {
            api_path: api_path.to_path_buf(),
            kind,
        };
        settings::save(&self.cfg.backend_record_path(), &backend).unwrap();
    }

    fn input(&self, name: &str) -> PathBuf {
        let path = self.path(&format!("in/{name}"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"source document").unwrap();
        path
    }

    fn calls(&self) -> String {
        std::fs::read_to_string(self.path("bin/calls.log")).unwrap_or_default()
    }

    fn scratch_is_empty(&self) -> bool {
        match std::fs::read_dir(self.path("scratch")) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

// Stands in for a host whose Office instance hangs: records a detached
// "instance" the way the script does, then never answers.
const HANGING_POWERSHELL: &str = r#"#!/bin/sh
pidfile=""
while [ $# -gt 0 ]; do
  case "$1" in
    -PidFile) pidfile="$2"; shift 2 ;;
    *) shift ;;
  esac
done
sleep 60 >/dev/null 2>&1 </dev/null &
echo $! > "$pidfile"
echo $! > "$(dirname "$0")/instance.pid"
exec sleep 30
"#;

const PARTIAL_POWERSHELL: &str = r#"#!/bin/sh
output=""
while [ $# -gt 0 ]; do
  case "$1" in
    -OutputPath) output="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf 'half a document' > "$output"
echo '{"ok":false,"error":"save failed","stage":"save"}'
"#;

fn process_is_gone(pid: &str) -> bool {
    // A killed orphan may linger as a zombie when nothing reaps it.
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(") ")
            .is_some_and(|(_, rest)| rest.starts_with('Z') || rest.starts_with('X')),
        Err(_) => true,
    }
}

fn soffice_body(ext_case: &str) -> String {
    FAKE_SOFFICE.replace("$EXT_CASE", ext_case)
}

#[test]
fn headless_docx_to_pdf() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    let soffice = fx.exe("soffice", &soffice_body("pdf"));
    fx.configure(&soffice, BackendKind::HeadlessTool);
    let input = fx.input("report.docx");
    let output = fx.path("out/report.pdf");

    let report = Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap();

    assert_eq!(std::fs::read_to_string(&output).unwrap(), "pdf from report.docx");
    assert_eq!(report.output_bytes, "pdf from report.docx".len() as u64);
    assert_eq!(report.backend, BackendKind::HeadlessTool);
    assert!(fx.scratch_is_empty());

    let calls = fx.calls();
    for flag in ["--headless", "--norestore", "--nolockcheck", "--nodefault", "--convert-to pdf", "--outdir"] {
        assert!(calls.contains(flag), "missing {flag} in {calls}");
    }
    assert!(calls.contains(&input.display().to_string()));
}

#[test]
fn headless_finds_output_with_different_case() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    let soffice = fx.exe("soffice", &soffice_body("PDF"));
    fx.configure(&soffice, BackendKind::HeadlessTool);
    let input = fx.input("deck.pptx");
    let output = fx.path("out/deck.pdf");

    Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap();

    assert_eq!(std::fs::read_to_string(&output).unwrap(), "pdf from deck.pptx");
    assert!(fx.scratch_is_empty());
}

#[test]
fn stale_destination_is_replaced() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    let soffice = fx.exe("soffice", &soffice_body("pdf"));
    fx.configure(&soffice, BackendKind::HeadlessTool);
    let input = fx.input("report.docx");
    let output = fx.path("out/report.pdf");
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();
    std::fs::write(&output, "an older and much longer pdf that must disappear").unwrap();

    Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap();

    assert_eq!(std::fs::read_to_string(&output).unwrap(), "pdf from report.docx");
}

#[test]
fn headless_nonzero_exit_is_conversion_failed() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    let soffice = fx.exe("soffice", "#!/bin/sh\nexit 2\n");
    fx.configure(&soffice, BackendKind::HeadlessTool);
    let input = fx.input("report.docx");
    let output = fx.path("out/report.pdf");

    let err = Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    assert!(!output.exists());
    assert!(fx.scratch_is_empty());
}

#[test]
fn headless_without_output_is_conversion_failed() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    let soffice = fx.exe("soffice", "#!/bin/sh\nexit 0\n");
    fx.configure(&soffice, BackendKind::HeadlessTool);
    let input = fx.input("report.docx");
    let output = fx.path("out/report.pdf");

    let err = Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    assert!(err.to_string().contains("report.pdf"));
    assert!(!output.exists());
    assert!(fx.scratch_is_empty());
}

#[test]
fn headless_timeout_is_conversion_failed() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut fx = Fixture::new();
    fx.cfg.headless.timeout_seconds = 1;
    let soffice = fx.exe("soffice", "#!/bin/sh\nexec sleep 30\n");
    fx.configure(&soffice, BackendKind::HeadlessTool);
    let input = fx.input("report.docx");
    let output = fx.path("out/report.pdf");

    let started = std::time::Instant::now();
    let err = Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap_err();

    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    assert!(err.to_string().contains("timed out"), "{err}");
    assert!(!output.exists());
    assert!(fx.scratch_is_empty());
}

#[test]
fn missing_headless_executable_is_backend_unavailable() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    fx.configure(&fx.path("bin/soffice"), BackendKind::HeadlessTool);
    let input = fx.input("report.docx");

    let err = Pipeline::new(&fx.cfg)
        .convert_file(&input, &fx.path("out/report.pdf"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
}

#[test]
fn automation_pdf_to_docx() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut fx = Fixture::new();
    let host = fx.exe("powershell", FAKE_POWERSHELL);
    fx.cfg.automation.powershell_exe = host.display().to_string();
    fx.configure(Path::new("C:/Office/root/Office16/WINWORD.EXE"), BackendKind::DocumentEditor);
    let input = fx.input("scan.pdf");
    let output = fx.path("out/scan.docx");

    let report = Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap();

    assert_eq!(report.backend, BackendKind::DocumentEditor);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "converted");
    let calls = fx.calls();
    assert!(calls.contains("-App Word"), "{calls}");
    assert!(calls.contains("-FileFormat 16"), "{calls}");
    assert!(calls.contains("-Visible 0"), "{calls}");
    assert!(calls.contains("-PidFile"), "{calls}");
    assert!(calls.contains("-NonInteractive"), "{calls}");
    assert!(calls.contains("script-present"), "{calls}");
    assert!(fx.scratch_is_empty());
}

#[test]
fn automation_slides_go_through_powerpoint() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut fx = Fixture::new();
    let host = fx.exe("powershell", FAKE_POWERSHELL);
    fx.cfg.automation.powershell_exe = host.display().to_string();
    fx.configure(Path::new("C:/Office/WINWORD.EXE"), BackendKind::DocumentEditor);
    let input = fx.input("deck.ppt");
    let output = fx.path("out/deck.pdf");

    Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap();

    let calls = fx.calls();
    assert!(calls.contains("-App PowerPoint"), "{calls}");
    assert!(calls.contains("-FileFormat 32"), "{calls}");
    assert!(calls.contains("-Visible 1"), "{calls}");
}

#[test]
fn automation_launch_failure_is_backend_unavailable() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut fx = Fixture::new();
    let host = fx.exe(
        "powershell",
        "#!/bin/sh\necho '{\"ok\":false,\"error\":\"COM class factory failed\",\"stage\":\"launch\"}'\n",
    );
    fx.cfg.automation.powershell_exe = host.display().to_string();
    fx.configure(Path::new("C:/Office/WINWORD.EXE"), BackendKind::DocumentEditor);
    let input = fx.input("report.docx");

    let err = Pipeline::new(&fx.cfg)
        .convert_file(&input, &fx.path("out/report.pdf"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert!(err.to_string().contains("COM class factory failed"));
}

#[test]
fn automation_save_failure_is_conversion_failed() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut fx = Fixture::new();
    let host = fx.exe(
        "powershell",
        "#!/bin/sh\necho '{\"ok\":false,\"error\":\"document is corrupt\",\"stage\":\"open\"}'\n",
    );
    fx.cfg.automation.powershell_exe = host.display().to_string();
    fx.configure(Path::new("C:/Office/WINWORD.EXE"), BackendKind::DocumentEditor);
    let input = fx.input("report.docx");

    let err = Pipeline::new(&fx.cfg)
        .convert_file(&input, &fx.path("out/report.pdf"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    assert!(err.to_string().contains("document is corrupt"));
}

#[test]
fn automation_timeout_kills_launched_instance() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut fx = Fixture::new();
    fx.cfg.automation.timeout_seconds = 1;
    let host = fx.exe("powershell", HANGING_POWERSHELL);
    fx.cfg.automation.powershell_exe = host.display().to_string();
    fx.configure(Path::new("C:/Office/WINWORD.EXE"), BackendKind::DocumentEditor);
    let input = fx.input("report.docx");
    let output = fx.path("out/report.pdf");

    let started = std::time::Instant::now();
    let err = Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap_err();

    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    assert!(err.to_string().contains("timed out"), "{err}");
    assert!(fx.scratch_is_empty());

    let pid = std::fs::read_to_string(fx.path("bin/instance.pid")).unwrap();
    let pid = pid.trim();
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !process_is_gone(pid) && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    assert!(process_is_gone(pid), "instance {pid} survived the timeout");
}

#[test]
fn automation_failure_removes_partial_output() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut fx = Fixture::new();
    let host = fx.exe("powershell", PARTIAL_POWERSHELL);
    fx.cfg.automation.powershell_exe = host.display().to_string();
    fx.configure(Path::new("C:/Office/WINWORD.EXE"), BackendKind::DocumentEditor);
    let input = fx.input("report.docx");
    let output = fx.path("out/report.pdf");

    let err = Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    assert!(err.to_string().contains("save failed"));
    assert!(!output.exists());
}

#[test]
fn missing_automation_host_is_backend_unavailable() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut fx = Fixture::new();
    fx.cfg.automation.powershell_exe = fx.path("bin/no-such-powershell").display().to_string();
    fx.configure(Path::new("C:/Office/WINWORD.EXE"), BackendKind::DocumentEditor);
    let input = fx.input("report.docx");

    let err = Pipeline::new(&fx.cfg)
        .convert_file(&input, &fx.path("out/report.pdf"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
}

#[test]
fn headless_pdf_to_docx_uses_pdf2docx() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut fx = Fixture::new();
    let python = fx.exe("python", FAKE_PYTHON);
    fx.cfg.pdf2docx.python_exe = python.display().to_string();
    let soffice = fx.exe("soffice", &soffice_body("pdf"));
    fx.configure(&soffice, BackendKind::HeadlessTool);
    let input = fx.input("scan.pdf");
    let output = fx.path("out/scan.docx");

    Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap();

    assert_eq!(std::fs::read_to_string(&output).unwrap(), "docx body");
    assert!(fx.scratch_is_empty());
    assert!(fx.calls().is_empty(), "soffice must not run for pdf -> docx");
}

#[test]
fn pdf2docx_missing_library_is_backend_unavailable() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut fx = Fixture::new();
    let python = fx.exe(
        "python",
        "#!/bin/sh\necho '{\"ok\":false,\"error\":\"pdf2docx is required\",\"stage\":\"launch\"}'\nexit 3\n",
    );
    fx.cfg.pdf2docx.python_exe = python.display().to_string();
    fx.configure(Path::new("/usr/bin/soffice"), BackendKind::HeadlessTool);
    let input = fx.input("scan.pdf");

    let err = Pipeline::new(&fx.cfg)
        .convert_file(&input, &fx.path("out/scan.docx"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert!(err.to_string().contains("pdf2docx is required"));
}

#[test]
fn missing_record_fails_before_side_effects() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    let input = fx.input("report.docx");
    let output = fx.path("out/report.pdf");

    let err = Pipeline::new(&fx.cfg).convert_file(&input, &output).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigurationMissing);
    assert!(!fx.path("out").exists());
    assert!(!fx.path("scratch").exists());
}

#[test]
fn unsupported_pair_fails_before_backend_lookup() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    let input = fx.input("report.docx");

    let err = Pipeline::new(&fx.cfg)
        .convert_file(&input, &fx.path("out/report.pptx"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedConversion);
}
