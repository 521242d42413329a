use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use gemini_studio::{
    ClientBuilder, Credential, CredentialStore, DispatchMode, FileCredentialStore, GeneratedImage,
    GenerationRequest, ImageCount, ReferenceBoard, SlotKind, require_credential,
};

use crate::args::{GenerateArgs, KeyAction};

pub fn credential_store(path: Option<&Path>) -> Result<FileCredentialStore> {
    match path {
        Some(path) => Ok(FileCredentialStore::new(path)),
        None => FileCredentialStore::default_location().context("no credential location available"),
    }
}

pub fn run_key(store: &dyn CredentialStore, action: KeyAction) -> Result<()> {
    match action {
        KeyAction::Set { key } => {
            let credential = Credential::new(key)?;
            store.save(&credential)?;
            println!("Saved API key {}", credential.masked());
        }
        KeyAction::Show => match store.load()? {
            Some(credential) => println!("{}", credential.masked()),
            None => bail!(gemini_studio::Error::MissingCredential {
                message: "no API key saved".into(),
            }),
        },
    }
    Ok(())
}

pub async fn run_generate(store: &dyn CredentialStore, args: GenerateArgs) -> Result<()> {
    let credential = match require_credential(store) {
        Ok(credential) => credential,
        Err(err) => Credential::from_env().map_err(|_| err)?,
    };

    let board = load_board(&args).await?;
    let request = GenerationRequest::from_board(
        args.prompt.as_str(),
        &board,
        ImageCount::clamped(args.count),
    )?;
    tracing::info!(
        attached = ?request.attached_images(),
        count = request.desired_count(),
        "built request"
    );

    let client = client_builder(&args).build()?;
    let result = client.generate(&request, &credential).await?;

    if args.print_uris {
        for uri in result.data_uris() {
            println!("{uri}");
        }
    } else {
        let paths = write_images(&args.out, &result.images)?;
        println!("{} image(s) from {}:", paths.len(), result.model);
        for path in paths {
            println!("  {}", path.display());
        }
    }
    Ok(())
}

fn client_builder(args: &GenerateArgs) -> ClientBuilder {
    let mut builder = ClientBuilder::from_env();
    if let Some(relay) = &args.relay {
        builder = builder.relay_url(relay.clone());
    }
    if !args.models.is_empty() {
        builder = builder.models(args.models.clone());
    }
    if args.concurrent {
        builder = builder.dispatch(DispatchMode::Concurrent);
    } else if let Some(spacing) = args.spacing_ms {
        builder = builder.dispatch(DispatchMode::Sequential {
            spacing: Duration::from_millis(spacing),
        });
    }
    if let Some(timeout) = args.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(ratio) = &args.aspect_ratio {
        builder = builder.aspect_ratio(ratio.clone());
    }
    builder
}

async fn load_board(args: &GenerateArgs) -> Result<ReferenceBoard> {
    let mut board = ReferenceBoard::new();
    let groups: [(SlotKind, Vec<&PathBuf>); 3] = [
        (SlotKind::Character, args.characters.iter().collect()),
        (SlotKind::Product, args.products.iter().collect()),
        (SlotKind::Background, args.background.iter().collect()),
    ];
    for (kind, paths) in groups {
        if paths.len() > kind.capacity() {
            bail!(
                "at most {} {kind} image(s) can be attached, got {}",
                kind.capacity(),
                paths.len()
            );
        }
        for path in paths {
            let id = board
                .next_free(kind)
                .map(ToString::to_string)
                .with_context(|| format!("no free {kind} slot"))?;
            board
                .load_image(&id, path)
                .await
                .with_context(|| format!("failed to load {}", path.display()))?;
        }
    }
    for id in &args.disabled {
        board.set_enabled(id, false)?;
    }
    Ok(board)
}

/// File name used for the `n`-th image (1-based).
pub fn output_name(index: usize, image: &GeneratedImage) -> String {
    format!("generated-image-{index}.{}", image.extension())
}

pub fn write_images(dir: &Path, images: &[GeneratedImage]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    images
        .iter()
        .enumerate()
        .map(|(index, image)| {
            let path = dir.join(output_name(index + 1, image));
            std::fs::write(&path, &image.data)
                .with_context(|| format!("failed to write {}", path.display()))?;
            Ok(path)
        })
        .collect()
}
