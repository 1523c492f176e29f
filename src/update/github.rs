use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::UpdateError;
use crate::models::Version;
use crate::update::version::parse_redirect_url;

const USER_AGENT: &str = concat!("tmod-update/", env!("CARGO_PKG_VERSION"));

fn client(config: &Config) -> Result<reqwest::blocking::Client, UpdateError> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.http_timeout())
        .build()
        .map_err(|e| UpdateError::network("failed to build HTTP client", e))
}

/// Follow the "latest release" redirect and read the version off the final URL.
pub fn resolve_latest(config: &Config) -> Result<Version, UpdateError> {
    let response = client(config)?
        .get(&config.latest_url)
        .send()
        .map_err(|e| UpdateError::network(format!("GET {}", config.latest_url), e))?;

    if !response.status().is_success() {
        return Err(UpdateError::http_status(&config.latest_url, response.status()));
    }

    let final_url = response.url().as_str();
    debug!(url = %final_url, "latest release redirect resolved");

    parse_redirect_url(final_url)
        .ok_or_else(|| UpdateError::MalformedResponse(final_url.to_string()))
}

/// `<download_base>/download/v<version>/<archive_name>`
pub fn release_url(config: &Config, version: &Version) -> String {
    format!(
        "{}/download/v{}/{}",
        config.download_base.trim_end_matches('/'),
        version,
        config.archive_name
    )
}

/// Local file name for a downloaded release, e.g. `tModLoader-v1.4.4.9.zip`.
pub fn release_file_name(config: &Config, version: &Version) -> String {
    let extension = archive_extension(&config.archive_name);
    format!("{}-v{}{}", config.install_dir_name, version, extension)
}

/// Where the release archive lands inside the fresh install directory.
pub fn release_path(config: &Config, version: &Version) -> PathBuf {
    config.install_dir().join(release_file_name(config, version))
}

fn archive_extension(name: &str) -> &str {
    if name.ends_with(".tar.gz") {
        ".tar.gz"
    } else {
        name.rfind('.').map(|i| &name[i..]).unwrap_or("")
    }
}

/// Download the release archive for `version` into the install directory.
///
/// The bytes are not verified in any way.
pub fn download_release(config: &Config, version: &Version) -> Result<PathBuf, UpdateError> {
    let url = release_url(config, version);
    let dest = release_path(config, version);
    info!(%url, dest = %dest.display(), "downloading release");

    let mut response = client(config)?
        .get(&url)
        .send()
        .map_err(|e| UpdateError::network(format!("GET {}", url), e))?;

    if !response.status().is_success() {
        return Err(UpdateError::http_status(&url, response.status()));
    }

    let pb = match response.content_length() {
        Some(total) => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let result = stream_to_file(&mut response, &dest, &pb);
    pb.finish_and_clear();
    let downloaded = result?;

    debug!(bytes = downloaded, "download complete");
    Ok(dest)
}

fn stream_to_file(
    response: &mut reqwest::blocking::Response,
    dest: &Path,
    pb: &ProgressBar,
) -> Result<u64, UpdateError> {
    let mut file =
        File::create(dest).map_err(|e| UpdateError::filesystem("create", dest, e))?;
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = response.read(&mut buffer).map_err(|e| UpdateError::Network {
            context: format!("reading response body: {}", e),
            source: None,
        })?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])
            .map_err(|e| UpdateError::filesystem("write", dest, e))?;
        downloaded += bytes_read as u64;
        pb.set_position(downloaded);
    }

    Ok(downloaded)
}
