//! Artifact placement, listing and pruning.
//!
//! The output tree is its own index: every query rescans it and recovers
//! platform, build type and date from the path segments the organization
//! settings produced.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};
use serde::Serialize;
use walkdir::WalkDir;

use crate::artifact::duration::parse_duration;
use crate::artifact::naming::{artifact_extension, artifact_file_name, ArtifactIdentity};
use crate::core::artifact::{BuildArtifact, UNIVERSAL_ARCH};
use crate::core::config::ArtifactsConfig;
use crate::core::errors::BuildError;
use crate::core::platform::Platform;
use crate::util::fs::{move_path, path_size, remove_dir_all_if_exists, remove_empty_dirs, remove_path};

/// How many date buckets `build_status` reports.
pub const RECENT_BUILDS_LIMIT: usize = 10;

/// Directory suffixes that are artifacts themselves rather than folders.
const BUNDLE_SUFFIXES: [&str; 2] = [".app", ".xcarchive"];

/// Architectures recognized in file names, most specific first.
const KNOWN_ARCHITECTURES: [&str; 6] = ["arm64", "armv7", "x86_64", "x64", "x86", UNIVERSAL_ARCH];

/// Query for `list_artifacts`. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ArtifactFilters {
    /// Date bucket label, e.g. `June-6`
    pub date: Option<String>,
    pub platform: Option<Platform>,
    pub build_type: Option<String>,
}

/// Artifact count for one date bucket.
#[derive(Debug, Clone, Serialize)]
pub struct RecentBuild {
    pub date: String,
    pub count: usize,
    pub size: u64,
    pub latest: DateTime<Local>,
}

/// Summary of the output tree.
#[derive(Debug, Clone, Serialize)]
pub struct BuildStatus {
    pub total_artifacts: usize,
    pub total_size: u64,
    pub last_build: Option<DateTime<Local>>,
    pub recent_builds: Vec<RecentBuild>,
}

/// What `clean_older_than` removed.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub cutoff: DateTime<Local>,
    pub removed: usize,
    pub freed_bytes: u64,
}

/// An artifact found on disk together with its date bucket label.
#[derive(Debug, Clone)]
struct ListedArtifact {
    bucket: String,
    artifact: BuildArtifact,
}

/// Owns the output tree under `artifacts.base_output_dir`.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    base_dir: PathBuf,
    config: ArtifactsConfig,
}

impl ArtifactManager {
    pub fn new(project_root: &Path, config: &ArtifactsConfig) -> Self {
        let base_dir = if config.base_output_dir.is_absolute() {
            config.base_output_dir.clone()
        } else {
            project_root.join(&config.base_output_dir)
        };

        ArtifactManager {
            base_dir,
            config: config.clone(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Date bucket label for a timestamp.
    pub fn date_bucket(&self, time: &DateTime<Local>) -> String {
        time.format(&self.config.organization.date_format).to_string()
    }

    /// Directory an artifact of this platform/build type lands in.
    pub fn output_dir(&self, platform: Platform, build_type: &str, time: &DateTime<Local>) -> PathBuf {
        let org = &self.config.organization;
        let mut dir = self.base_dir.clone();
        if org.by_date {
            dir.push(self.date_bucket(time));
        }
        if org.by_platform {
            dir.push(platform.as_str());
        }
        if org.by_build_type && !build_type.is_empty() {
            dir.push(build_type);
        }
        dir
    }

    /// Rename a raw artifact and move it into the output tree.
    ///
    /// `claimed` collects the destinations written during the current run.
    /// An artifact whose name resolves to one of them is refused, so two
    /// outputs of one build never replace each other.
    pub fn organize(
        &self,
        raw: BuildArtifact,
        identity: &ArtifactIdentity,
        claimed: &mut HashSet<PathBuf>,
    ) -> Result<BuildArtifact, BuildError> {
        let organize_err = |message: String| BuildError::Organize {
            artifact: raw.file_path.display().to_string(),
            message,
        };

        if !raw.file_path.exists() {
            return Err(organize_err("source does not exist".to_string()));
        }

        let file_name = artifact_file_name(&self.config.naming.pattern, identity, &raw);
        let dest = self
            .output_dir(raw.platform, &raw.build_type, &raw.build_time)
            .join(&file_name);

        if claimed.contains(&dest) {
            return Err(organize_err(format!(
                "{} was already written by another artifact of this build; \
                 add {{arch}} or {{build_type}} to artifacts.naming.pattern",
                dest.display()
            )));
        }

        move_path(&raw.file_path, &dest).map_err(|e| organize_err(format!("{:#}", e)))?;
        claimed.insert(dest.clone());
        let size = path_size(&dest).map_err(|e| organize_err(format!("{:#}", e)))?;

        tracing::info!("Organized {} -> {}", raw.file_name, dest.display());

        Ok(BuildArtifact {
            file_name,
            file_path: dest,
            size,
            app_name: identity.app_name.clone(),
            version: identity.version.clone(),
            ..raw
        })
    }

    /// Artifacts in the output tree matching `filters`, newest first.
    pub fn list_artifacts(&self, filters: &ArtifactFilters) -> Result<Vec<BuildArtifact>, BuildError> {
        Ok(self
            .scan(Local::now())?
            .into_iter()
            .filter(|listed| {
                filters.date.as_ref().map_or(true, |d| &listed.bucket == d)
                    && filters
                        .platform
                        .map_or(true, |p| listed.artifact.platform == p)
                    && filters
                        .build_type
                        .as_ref()
                        .map_or(true, |b| &listed.artifact.build_type == b)
            })
            .map(|listed| listed.artifact)
            .collect())
    }

    /// Totals and the most recent date buckets.
    pub fn build_status(&self) -> Result<BuildStatus, BuildError> {
        let listed = self.scan(Local::now())?;

        let mut buckets: BTreeMap<String, RecentBuild> = BTreeMap::new();
        for entry in &listed {
            let artifact = &entry.artifact;
            let bucket = buckets
                .entry(entry.bucket.clone())
                .or_insert_with(|| RecentBuild {
                    date: entry.bucket.clone(),
                    count: 0,
                    size: 0,
                    latest: artifact.build_time,
                });
            bucket.count += 1;
            bucket.size += artifact.size;
            if artifact.build_time > bucket.latest {
                bucket.latest = artifact.build_time;
            }
        }

        let mut recent_builds: Vec<RecentBuild> = buckets.into_values().collect();
        recent_builds.sort_by(|a, b| b.latest.cmp(&a.latest).then_with(|| a.date.cmp(&b.date)));
        recent_builds.truncate(RECENT_BUILDS_LIMIT);

        Ok(BuildStatus {
            total_artifacts: listed.len(),
            total_size: listed.iter().map(|l| l.artifact.size).sum(),
            last_build: listed.iter().map(|l| l.artifact.build_time).max(),
            recent_builds,
        })
    }

    /// Remove the whole output tree.
    pub fn clean_all(&self) -> Result<(), BuildError> {
        remove_dir_all_if_exists(&self.base_dir).map_err(|e| BuildError::Organize {
            artifact: self.base_dir.display().to_string(),
            message: format!("{:#}", e),
        })?;
        tracing::info!("Removed {}", self.base_dir.display());
        Ok(())
    }

    /// Remove artifacts built before `now - expr`.
    pub fn clean_older_than(&self, expr: &str) -> Result<CleanupReport, BuildError> {
        self.clean_older_than_at(expr, Local::now())
    }

    pub(crate) fn clean_older_than_at(
        &self,
        expr: &str,
        now: DateTime<Local>,
    ) -> Result<CleanupReport, BuildError> {
        let age = parse_duration(expr)?;
        let cutoff = age.cutoff(now).ok_or_else(|| BuildError::InvalidDuration {
            expr: expr.to_string(),
            message: "cutoff is out of range".to_string(),
        })?;

        let mut report = CleanupReport {
            cutoff,
            removed: 0,
            freed_bytes: 0,
        };

        for listed in self.scan(now)? {
            let artifact = listed.artifact;
            if artifact.build_time >= cutoff {
                continue;
            }
            remove_path(&artifact.file_path).map_err(|e| BuildError::Organize {
                artifact: artifact.file_path.display().to_string(),
                message: format!("{:#}", e),
            })?;
            tracing::debug!("Removed {}", artifact.file_path.display());
            report.removed += 1;
            report.freed_bytes += artifact.size;
        }

        remove_empty_dirs(&self.base_dir).map_err(|e| BuildError::Organize {
            artifact: self.base_dir.display().to_string(),
            message: format!("{:#}", e),
        })?;

        tracing::info!(
            "Removed {} artifact(s) older than {} ({} bytes)",
            report.removed,
            age,
            report.freed_bytes
        );
        Ok(report)
    }

    /// Walk the output tree. A missing tree is empty.
    fn scan(&self, now: DateTime<Local>) -> Result<Vec<ListedArtifact>, BuildError> {
        let mut found = Vec::new();
        if !self.base_dir.is_dir() {
            return Ok(found);
        }

        let mut walker = WalkDir::new(&self.base_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| BuildError::Io {
                context: format!("failed to walk {}", self.base_dir.display()),
                source: e.into(),
            })?;
            let name = entry.file_name().to_string_lossy();
            let is_dir = entry.file_type().is_dir();

            if name.starts_with('.') {
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }
            if is_dir {
                if !BUNDLE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
                    continue;
                }
                walker.skip_current_dir();
            } else if !entry.file_type().is_file() {
                continue;
            }

            if let Some(listed) = self.parse_entry(entry.path(), now) {
                found.push(listed);
            }
        }

        found.sort_by(|a, b| {
            b.artifact
                .build_time
                .cmp(&a.artifact.build_time)
                .then_with(|| a.artifact.file_path.cmp(&b.artifact.file_path))
        });
        Ok(found)
    }

    /// Recover an artifact from its place in the tree.
    fn parse_entry(&self, path: &Path, now: DateTime<Local>) -> Option<ListedArtifact> {
        let org = &self.config.organization;
        let rel = path.strip_prefix(&self.base_dir).ok()?;
        let segments: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let (file_name, dirs) = segments.split_last()?;

        let expected = [org.by_date, org.by_platform, org.by_build_type]
            .iter()
            .filter(|on| **on)
            .count();
        if dirs.len() != expected {
            tracing::debug!("Skipping {}: not in the output layout", path.display());
            return None;
        }

        let mut dirs = dirs.iter();
        let bucket = if org.by_date { dirs.next().cloned() } else { None };
        let platform = if org.by_platform {
            dirs.next()?.parse::<Platform>().ok()?
        } else {
            Platform::from_artifact_extension(artifact_extension(file_name)?)?
        };
        let build_type = if org.by_build_type {
            dirs.next().cloned()?
        } else {
            artifact_extension(file_name).unwrap_or_default().to_string()
        };

        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Local>::from);
        let bucket_date = bucket
            .as_deref()
            .and_then(|b| parse_date_bucket(b, &org.date_format, now));
        let build_time = match (bucket_date, modified) {
            (Some(date), Some(mtime)) if mtime.date_naive() == date => mtime,
            (Some(date), _) => start_of_day(date)?,
            (None, Some(mtime)) => mtime,
            (None, None) => now,
        };

        let size = path_size(path).unwrap_or(0);
        let mut artifact = BuildArtifact::raw(platform, detect_architecture(file_name), path);
        artifact.build_type = build_type;
        artifact.size = size;
        artifact.build_time = build_time;

        Some(ListedArtifact {
            bucket: bucket.unwrap_or_else(|| self.date_bucket(&build_time)),
            artifact,
        })
    }
}

/// Architecture named in a file name, `universal` when none is.
pub fn detect_architecture(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    KNOWN_ARCHITECTURES
        .into_iter()
        .find(|arch| lower.contains(*arch))
        .unwrap_or(UNIVERSAL_ARCH)
}

/// Parse a date bucket label back into a date.
///
/// Formats without a year resolve to the most recent date not after `now`.
pub fn parse_date_bucket(label: &str, format: &str, now: DateTime<Local>) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(label, format) {
        return Some(date);
    }

    let today = now.date_naive();
    let with_year = format!("{} %Y", format);
    [today.year(), today.year() - 1]
        .into_iter()
        .filter_map(|year| NaiveDate::parse_from_str(&format!("{} {}", label, year), &with_year).ok())
        .find(|date| *date <= today)
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Local>> {
    Local
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()
}
