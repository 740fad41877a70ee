use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use threedai_backend::BackendChoice;
use threedai_core::glb::{load_glb_mesh, save_glb};
use threedai_core::step::{write_step, StepOptions, StepOutcome};
use threedai_core::stl::{read_binary_stl, save_binary_stl, triangles_to_mesh};
use threedai_core::MeshData;
use threedai_server::config::RESULTS_DIR_ENV;
use threedai_server::{HttpServer, RequestHandler, ServerConfig};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "threedai")]
#[command(about = "Image to 3D generation service and mesh conversion tools.")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value_t = 5000)]
        port: u16,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, env = RESULTS_DIR_ENV)]
        results_dir: Option<PathBuf>,
        /// Default backend when a request does not name one.
        #[arg(long)]
        backend: Option<String>,
        #[arg(long)]
        max_concurrent_generations: Option<usize>,
    },
    /// Convert a GLB or binary STL mesh to other formats.
    Convert {
        input: PathBuf,
        #[arg(long)]
        stl: Option<PathBuf>,
        #[arg(long)]
        step: Option<PathBuf>,
        #[arg(long)]
        glb: Option<PathBuf>,
    },
    /// Upload an image to a running service and download the results.
    Submit {
        image: PathBuf,
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        server: String,
        #[arg(long)]
        backend: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Print which optional converters this build includes.
    Capabilities,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Command::Serve {
            host,
            port,
            config,
            results_dir,
            backend,
            max_concurrent_generations,
        } => {
            let mut cfg = ServerConfig::load(config.as_deref()).context("load config")?;
            if let Some(dir) = results_dir {
                cfg.results_dir = dir;
            }
            if let Some(name) = backend {
                cfg.backend = name.parse::<BackendChoice>().context("--backend")?;
            }
            if let Some(limit) = max_concurrent_generations {
                cfg.max_concurrent_generations = limit;
            }
            serve(&cfg, &host, port)
        }
        Command::Convert {
            input,
            stl,
            step,
            glb,
        } => convert(&input, stl.as_deref(), step.as_deref(), glb.as_deref()),
        Command::Submit {
            image,
            server,
            backend,
            prompt,
            out,
        } => submit(&image, &server, backend.as_deref(), prompt.as_deref(), &out),
        Command::Capabilities => {
            let json = serde_json::to_string_pretty(&threedai_core::capabilities())
                .context("serialize capabilities")?;
            println!("{json}");
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    fmt().with_env_filter(filter).with_target(false).init();
}

fn serve(cfg: &ServerConfig, host: &str, port: u16) -> Result<()> {
    let handler = RequestHandler::from_config(cfg)
        .with_context(|| format!("open results dir: {:?}", cfg.results_dir))?;
    let server =
        HttpServer::bind(&format!("{host}:{port}"))?.with_max_upload_bytes(cfg.max_upload_bytes);
    info!(
        addr = %server.local_addr(),
        results_dir = %cfg.results_dir.display(),
        backend = %cfg.backend,
        "threedai ready"
    );
    server.serve(handler);
    Ok(())
}

fn convert(
    input: &Path,
    stl: Option<&Path>,
    step: Option<&Path>,
    glb: Option<&Path>,
) -> Result<()> {
    if stl.is_none() && step.is_none() && glb.is_none() {
        bail!("nothing to do: pass at least one of --stl, --step, --glb");
    }
    ensure_input_file(input)?;
    let mesh = load_mesh(input)?;
    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "loaded {input:?}"
    );

    if let Some(path) = stl {
        save_binary_stl(&mesh, path).with_context(|| format!("write stl: {path:?}"))?;
        println!("wrote {path:?} ({} triangles)", mesh.face_count());
    }
    if let Some(path) = step {
        let name = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("mesh");
        match write_step(&mesh, path, &StepOptions::named(name))
            .with_context(|| format!("write step: {path:?}"))?
        {
            StepOutcome::Written { faces, skipped } => {
                println!("wrote {path:?} ({faces} faces, {skipped} degenerate skipped)");
            }
            StepOutcome::Placeholder { reason } => {
                println!("wrote placeholder {path:?}: {reason}");
            }
        }
    }
    if let Some(path) = glb {
        save_glb(&mesh, path).with_context(|| format!("write glb: {path:?}"))?;
        println!("wrote {path:?}");
    }
    Ok(())
}

fn load_mesh(input: &Path) -> Result<MeshData> {
    let ext = input
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "glb" | "gltf" => load_glb_mesh(input).with_context(|| format!("load mesh: {input:?}")),
        "stl" => {
            let bytes = std::fs::read(input).with_context(|| format!("read stl: {input:?}"))?;
            let triangles =
                read_binary_stl(&bytes).with_context(|| format!("parse stl: {input:?}"))?;
            Ok(triangles_to_mesh(&triangles))
        }
        _ => bail!("Unsupported input extension: .{ext}"),
    }
}

fn submit(
    image: &Path,
    server: &str,
    backend: Option<&str>,
    prompt: Option<&str>,
    out: &Path,
) -> Result<()> {
    use reqwest::blocking::multipart::{Form, Part};

    ensure_input_file(image)?;
    let bytes = std::fs::read(image).with_context(|| format!("read image: {image:?}"))?;
    let file_name = image
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("image.jpg")
        .to_string();

    let mut form = Form::new().part("image", Part::bytes(bytes).file_name(file_name));
    if let Some(backend) = backend {
        form = form.text("backend", backend.to_string());
    }
    if let Some(prompt) = prompt {
        form = form.text("prompt", prompt.to_string());
    }

    // Generation runs inside the request, so no client timeout.
    let client = reqwest::blocking::Client::builder()
        .timeout(None::<std::time::Duration>)
        .build()
        .context("build http client")?;
    let base = server.trim_end_matches('/');
    let response = client
        .post(format!("{base}/api/process"))
        .multipart(form)
        .send()
        .with_context(|| format!("POST {base}/api/process"))?;
    let status = response.status();
    let body: serde_json::Value = response.json().context("decode response")?;
    if !status.is_success() {
        let message = body["error"].as_str().unwrap_or("unknown error");
        bail!("server returned {status}: {message}");
    }

    let process_id = body["process_id"].as_str().context("response has no process_id")?;
    println!("process {process_id}");
    std::fs::create_dir_all(out).with_context(|| format!("create out dir: {out:?}"))?;

    let downloads = [
        ("video_url", "video.mp4".to_string()),
        ("model3d_url", format!("model_{process_id}.bin")),
    ];
    for (key, fallback) in downloads {
        let url = body[key]
            .as_str()
            .with_context(|| format!("response has no {key}"))?;
        let response = client
            .get(format!("{base}{url}"))
            .send()
            .with_context(|| format!("GET {url}"))?;
        if !response.status().is_success() {
            println!("{key}: {} (skipped)", response.status());
            continue;
        }
        let name = attachment_name(&response).unwrap_or(fallback);
        let path = out.join(name);
        let data = response.bytes().with_context(|| format!("download {url}"))?;
        std::fs::write(&path, &data).with_context(|| format!("write {path:?}"))?;
        println!("wrote {path:?} ({} bytes)", data.len());
    }
    Ok(())
}

fn attachment_name(response: &reqwest::blocking::Response) -> Option<String> {
    let value = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)?
        .to_str()
        .ok()?;
    let (_, name) = value.split_once("filename=")?;
    let name = name.trim().trim_matches('"');
    // Only a bare file name is acceptable as a local path.
    (!name.is_empty() && !name.contains(['/', '\\']) && name != "..").then(|| name.to_string())
}

fn ensure_input_file(input: &Path) -> Result<()> {
    match std::fs::metadata(input) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => bail!("input is not a file: {input:?}"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            bail!("input not found: {input:?} (cwd: {cwd:?}).");
        }
        Err(err) => Err(err).with_context(|| format!("stat input: {input:?}")),
    }
}
