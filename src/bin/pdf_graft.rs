//! Command line front end for pdf_graft
//!
//! Usage:
//!   pdf_graft concat <out.pdf> <in.pdf>... [--tagged] [--forms]
//!   pdf_graft outline-export <in.pdf> [--json] [--encoding <name>]
//!   pdf_graft outline-import <in.pdf> <bookmarks.xml> <out.pdf>
//!   pdf_graft sign <in.pdf> <out.pdf> --cert <cert.der> --key <key.der>
//!             [--field <name>] [--reason <text>] [--location <text>] [--rewrite]
//!   pdf_graft inspect <in.pdf>
//!
//! Set RUST_LOG=debug for a trace of what the library does.

use pdf_graft::config::CopyOptions;
use pdf_graft::copy::PdfCopy;
use pdf_graft::outline::{export_to_xml, import_from_xml, shift_page_numbers, Bookmark};
use pdf_graft::reader::{PdfReader, SourceDocument};
use pdf_graft::signatures::find_signatures;
use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

type CliResult = std::result::Result<(), Box<dyn std::error::Error>>;

const USAGE: &str = "Usage:
  pdf_graft concat <out.pdf> <in.pdf>... [--tagged] [--forms]
  pdf_graft outline-export <in.pdf> [--json] [--encoding <name>]
  pdf_graft outline-import <in.pdf> <bookmarks.xml> <out.pdf>
  pdf_graft sign <in.pdf> <out.pdf> --cert <cert.der> --key <key.der> [--field <name>] [--reason <text>] [--location <text>] [--rewrite]
  pdf_graft inspect <in.pdf>";

/// Positional arguments and `--flag [value]` options.
struct Args {
    positional: Vec<String>,
    flags: Vec<String>,
    values: Vec<(String, String)>,
}

impl Args {
    /// Options listed in `with_value` consume the following argument.
    fn parse(args: &[String], with_value: &[&str]) -> std::result::Result<Self, String> {
        let mut parsed = Args {
            positional: Vec::new(),
            flags: Vec::new(),
            values: Vec::new(),
        };
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if let Some(name) = arg.strip_prefix("--") {
                if with_value.contains(&name) {
                    i += 1;
                    let value = args.get(i).ok_or_else(|| format!("--{} needs a value", name))?;
                    parsed.values.push((name.to_string(), value.clone()));
                } else {
                    parsed.flags.push(name.to_string());
                }
            } else {
                parsed.positional.push(arg.clone());
            }
            i += 1;
        }
        Ok(parsed)
    }

    fn flag(&self, name: &str) -> bool {
        self.flags.iter().any(|f| f == name)
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.values.iter().rev().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let outcome = match command.as_str() {
        "concat" => Args::parse(rest, &[]).map(concat),
        "outline-export" => Args::parse(rest, &["encoding"]).map(outline_export),
        "outline-import" => Args::parse(rest, &[]).map(outline_import),
        "sign" => Args::parse(rest, &["cert", "key", "field", "reason", "location"]).map(sign),
        "inspect" => Args::parse(rest, &[]).map(inspect),
        "--help" | "-h" | "help" => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        },
        other => Err(format!("unknown command '{}'", other)),
    };

    match outcome {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
        Err(message) => {
            eprintln!("Error: {}\n\n{}", message, USAGE);
            ExitCode::from(2)
        },
    }
}

fn usage_error(message: &str) -> Box<dyn std::error::Error> {
    format!("{}\n\n{}", message, USAGE).into()
}

fn concat(args: Args) -> CliResult {
    let [output, inputs @ ..] = args.positional.as_slice() else {
        return Err(usage_error("concat needs an output and at least one input"));
    };
    if inputs.is_empty() {
        return Err(usage_error("concat needs at least one input"));
    }

    let options = CopyOptions::new()
        .with_tagged(args.flag("tagged"))
        .with_acroform(args.flag("forms"));
    let mut copy = PdfCopy::new(options);
    let mut outlines: Vec<Bookmark> = Vec::new();

    for input in inputs {
        let mut reader = PdfReader::open(input)?;
        let page_count = reader.page_count()?;
        let mut bookmarks = Bookmark::from_reader(&mut reader)?;
        shift_page_numbers(&mut bookmarks, copy.page_count() as i64, None);
        outlines.extend(bookmarks);

        let pages: Vec<usize> = (1..=page_count).collect();
        copy.add_pages(&mut reader, &pages)?;
        copy.free_reader(reader.id());
        println!("{}: {} pages", input, page_count);
    }

    if !outlines.is_empty() {
        copy.set_outlines(outlines);
    }
    let total = copy.page_count();
    copy.save(output)?;
    println!("Wrote {} pages to {}", total, output);
    Ok(())
}

fn outline_export(args: Args) -> CliResult {
    let [input] = args.positional.as_slice() else {
        return Err(usage_error("outline-export needs exactly one input"));
    };
    let mut reader = PdfReader::open(input)?;
    let bookmarks = Bookmark::from_reader(&mut reader)?;

    if args.flag("json") {
        println!("{}", serde_json::to_string_pretty(&bookmarks)?);
    } else {
        let encoding = args.value("encoding").unwrap_or("UTF-8");
        export_to_xml(&bookmarks, std::io::stdout().lock(), encoding)?;
        println!();
    }
    Ok(())
}

fn outline_import(args: Args) -> CliResult {
    let [input, xml, output] = args.positional.as_slice() else {
        return Err(usage_error("outline-import needs an input, a bookmark file and an output"));
    };
    let bookmarks = import_from_xml(BufReader::new(File::open(xml)?))?;

    let mut reader = PdfReader::open(input)?;
    let pages: Vec<usize> = (1..=reader.page_count()?).collect();
    let mut copy = PdfCopy::new(CopyOptions::new().with_tagged(true).with_acroform(true));
    copy.add_pages(&mut reader, &pages)?;
    let count = bookmarks.len();
    copy.set_outlines(bookmarks);
    copy.save(output)?;
    println!("Wrote {} with {} top-level bookmarks", output, count);
    Ok(())
}

#[cfg(feature = "signatures")]
fn sign(args: Args) -> CliResult {
    use pdf_graft::config::StamperOptions;
    use pdf_graft::signatures::{sign_detached, PdfStamper, Pkcs7Container, SignatureDictionary, SigningCredentials};

    let [input, output] = args.positional.as_slice() else {
        return Err(usage_error("sign needs an input and an output"));
    };
    let (Some(cert), Some(key)) = (args.value("cert"), args.value("key")) else {
        return Err(usage_error("sign needs --cert and --key"));
    };

    let credentials = SigningCredentials::from_der(&std::fs::read(cert)?, &std::fs::read(key)?)?;
    let subject = credentials.subject()?;
    let mut signature = SignatureDictionary::default().with_name(subject.clone());
    if let Some(reason) = args.value("reason") {
        signature = signature.with_reason(reason);
    }
    if let Some(location) = args.value("location") {
        signature = signature.with_location(location);
    }

    let reader = PdfReader::open(input)?;
    let options = StamperOptions::new().with_append(!args.flag("rewrite"));
    let mut stamper = PdfStamper::new(reader, File::create(output)?, options)?;
    stamper.add_signature_field(args.value("field").unwrap_or("Signature1"), 1, [0.0, 0.0, 0.0, 0.0])?;

    let mut container = Pkcs7Container::new(credentials);
    sign_detached(stamper, &mut container, &signature, 0)?;
    println!("Signed {} as {} -> {}", input, subject, output);
    Ok(())
}

#[cfg(not(feature = "signatures"))]
fn sign(_args: Args) -> CliResult {
    Err(pdf_graft::Error::Unsupported("signing needs pdf_graft built with the `signatures` feature".to_string()).into())
}

fn inspect(args: Args) -> CliResult {
    let [input] = args.positional.as_slice() else {
        return Err(usage_error("inspect needs exactly one input"));
    };
    let data = std::fs::read(input)?;
    let mut reader = PdfReader::from_bytes(data.clone())?;

    println!("File:     {}", input);
    println!("Version:  {}", reader.version());
    println!("Pages:    {}", reader.page_count()?);
    println!("Outlines: {}", Bookmark::from_reader(&mut reader)?.len());

    let signatures = find_signatures(&mut reader)?;
    println!("Signatures: {}", signatures.len());
    for (name, info) in &signatures {
        let covers_file = pdf_graft::signatures::validate_byte_range(&info.byte_range, data.len()).is_ok();
        println!(
            "  {} signer={} time={} byte_range={:?}{}",
            name,
            info.signer_name.as_deref().unwrap_or("-"),
            info.signing_time.as_deref().unwrap_or("-"),
            info.byte_range,
            if covers_file { "" } else { " (does not cover the whole file)" }
        );
        describe_container(&data, info);
    }
    Ok(())
}

#[cfg(feature = "signatures")]
fn describe_container(data: &[u8], info: &pdf_graft::signatures::SignatureInfo) {
    use pdf_graft::signatures::{extract_signed_bytes, SignedDataSummary};

    let summary = match SignedDataSummary::parse(info.trimmed_contents()) {
        Ok(summary) => summary,
        Err(e) => {
            println!("    container: unreadable ({})", e);
            return;
        },
    };
    let verified = extract_signed_bytes(data, &info.byte_range).and_then(|signed| summary.verify(&signed));
    println!(
        "    subject={} digest={:?} certificates={} verified={}",
        summary.signer_subject.as_deref().unwrap_or("-"),
        summary.digest_algorithm,
        summary.certificate_count,
        match verified {
            Ok(ok) => ok.to_string(),
            Err(e) => format!("error ({})", e),
        }
    );
}

#[cfg(not(feature = "signatures"))]
fn describe_container(_data: &[u8], info: &pdf_graft::signatures::SignatureInfo) {
    println!("    container: {} bytes", info.trimmed_contents().len());
}
