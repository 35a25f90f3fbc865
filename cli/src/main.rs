use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use sxar::Archive;
use sxar::Error;
use sxar::FileNode;
use sxar::SignatureResources;

#[derive(Parser)]
#[clap(arg_required_else_help = true, about = "XAR archiver for Safari extensions")]
struct Args {
    /// Create an archive.
    #[arg(short = 'c')]
    create: bool,

    /// Print an archive's table of contents.
    #[arg(short = 't')]
    list: bool,

    /// An archive.
    #[arg(short = 'f')]
    file_name: PathBuf,

    /// Path to a file with a PEM-encoded RSA private key to sign with.
    #[arg(long = "sign", value_name = "FILE")]
    signing_key_file: Option<PathBuf>,

    /// PEM-encoded X509 certificates to embed in the archive.
    ///
    /// The first certificate must correspond to the signing key; the rest
    /// follow in verification-chain order. The argument can be repeated.
    #[arg(long = "cert", value_name = "CERT")]
    certs: Vec<PathBuf>,

    /// Files.
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "FILE"
    )]
    paths: Vec<PathBuf>,
}

impl Args {
    fn command(&self) -> Result<Command, Error> {
        match (self.create, self.list) {
            (true, false) => Ok(Command::Create),
            (false, true) => Ok(Command::List),
            (false, false) => Err(Error::InvalidInput("no command specified".into())),
            (..) => Err(Error::InvalidInput("conflicting commands specified".into())),
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match do_main() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn do_main() -> Result<ExitCode, Error> {
    let args = Args::parse();
    match args.command()? {
        Command::Create => create(args),
        Command::List => list(args),
    }
}

fn create(args: Args) -> Result<ExitCode, Error> {
    let mut roots = Vec::new();
    for path in args.paths.iter() {
        let path = std::fs::canonicalize(path)?;
        roots.push(build_node(&path)?);
    }
    let mut archive = Archive::new(roots);
    if let Some(ref signing_key_file) = args.signing_key_file {
        let private_key = std::fs::read_to_string(signing_key_file)?;
        let mut certs = args.certs.iter();
        let cert = match certs.next() {
            Some(path) => std::fs::read_to_string(path)?,
            None => {
                return Err(Error::InvalidInput(
                    "--sign requires at least one --cert".into(),
                ))
            }
        };
        let additional_certs = certs
            .map(std::fs::read_to_string)
            .collect::<std::io::Result<Vec<_>>>()?;
        archive.set_signature_resources(SignatureResources {
            cert,
            private_key,
            additional_certs,
        });
    }
    let writer = File::create(&args.file_name)?;
    archive.generate(writer, |path| File::open(path))?;
    Ok(ExitCode::SUCCESS)
}

fn list(args: Args) -> Result<ExitCode, Error> {
    let file = File::open(&args.file_name)?;
    let toc = sxar::read_toc(file)?;
    println!("{toc}");
    Ok(ExitCode::SUCCESS)
}

/// Build a file node for `path`, recursing into directories with children
/// sorted by name so archives come out deterministic.
fn build_node(path: &Path) -> Result<FileNode, Error> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidInput(format!("{}: no file name", path.display())))?;
    let metadata = path.metadata()?;
    if metadata.is_dir() {
        let mut entries = Vec::new();
        for entry in path.read_dir()? {
            entries.push(entry?.path());
        }
        entries.sort();
        let children = entries
            .iter()
            .map(|entry| build_node(entry))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(FileNode::directory(name, path, children))
    } else {
        Ok(FileNode::file(name, path, metadata.len()))
    }
}

enum Command {
    Create,
    List,
}
