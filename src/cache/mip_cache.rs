//! Priority-scheduled cache of multi-resolution page tiles.
//!
//! Every file named by the manifest is tracked from construction on. Files
//! are fetched one at a time, highest priority first, and evicted by
//! priority then recency once the loaded-file cap is reached. Failures are
//! terminal for the file.
//!
//! A draw request raises a file above its preload priority. Pending requests
//! hold until the file loads; a loaded file that is not requested again
//! before the next pump falls back to its preload priority.

use std::sync::Arc;

use super::manifest::{Manifest, MipFileInfo};
use super::pool::BoundedPool;
use super::scheduler::{FetchOutcome, FetchRequest, FetchScheduler};
use crate::config::CacheConfig;
use crate::error::TileError;
use crate::format::{ContainerError, Tile, parse_container};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Unloaded,
    Loading,
    Loaded,
    /// Fetch or parse failed; never retried
    Error,
}

#[derive(Debug)]
struct MipFile {
    info: MipFileInfo,
    state: FileState,
    priority: u32,
    /// Priority from the preload tiers alone
    base: u32,
    /// Asked for by `get_mip_page` since the last pump
    requested: bool,
}

/// Resident tiles of one page, indexed by mip level.
#[derive(Debug, Clone, Default)]
struct MipPage {
    tiles: Vec<Option<Arc<Tile>>>,
}

/// Snapshot of a page's resident tiles at or above a requested level.
#[derive(Debug, Clone, PartialEq)]
pub struct MipPageView {
    pub page: usize,
    /// Indexed by level; levels finer than the request are always `None`
    pub levels: Vec<Option<Arc<Tile>>>,
}

impl MipPageView {
    pub fn tile(&self, level: usize) -> Option<&Arc<Tile>> {
        self.levels.get(level).and_then(Option::as_ref)
    }

    pub fn finest_resident(&self) -> Option<usize> {
        self.levels.iter().position(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(Option::is_none)
    }
}

#[derive(Debug)]
pub enum CacheEvent {
    Loaded { file: usize },
    Failed { file: usize, error: TileError },
    Evicted { file: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub files: usize,
    pub loaded: usize,
    pub loading: usize,
    pub failed: usize,
    pub fetches: u64,
    pub evictions: u64,
}

type ErrorCallback = Box<dyn FnMut(&MipFileInfo, &TileError)>;

pub struct MipCache {
    manifest: Manifest,
    files: Vec<MipFile>,
    pages: Vec<MipPage>,
    /// page -> level -> file index
    page_files: Vec<Vec<usize>>,
    loaded: BoundedPool<usize, Vec<Arc<Tile>>>,
    scheduler: Box<dyn FetchScheduler>,
    config: CacheConfig,
    preload_page: Option<usize>,
    dirty: bool,
    on_error: Option<ErrorCallback>,
    fetches: u64,
    evictions: u64,
}

impl MipCache {
    pub fn new(manifest: Manifest, scheduler: Box<dyn FetchScheduler>, config: CacheConfig) -> Self {
        let level_count = manifest.level_count();
        let page_count = manifest.page_count;
        let infos = manifest.files();

        let mut page_files = vec![vec![usize::MAX; level_count]; page_count];
        for info in &infos {
            for page in info.pages() {
                page_files[page][info.level] = info.index;
            }
        }
        let files = infos
            .into_iter()
            .map(|info| MipFile {
                info,
                state: FileState::Unloaded,
                priority: 0,
                base: 0,
                requested: false,
            })
            .collect::<Vec<_>>();

        log::info!(
            "Tile cache: {} pages, {} levels, {} files, cap {}",
            page_count,
            level_count,
            files.len(),
            config.loaded_file_cap
        );

        Self {
            manifest,
            files,
            pages: vec![
                MipPage {
                    tiles: vec![None; level_count],
                };
                page_count
            ],
            page_files,
            loaded: BoundedPool::new(),
            scheduler,
            config,
            preload_page: None,
            dirty: true,
            on_error: None,
            fetches: 0,
            evictions: 0,
        }
    }

    /// Called with each file that fails to load.
    pub fn on_error(&mut self, callback: impl FnMut(&MipFileInfo, &TileError) + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn page_count(&self) -> usize {
        self.manifest.page_count
    }

    pub fn level_count(&self) -> usize {
        self.manifest.level_count()
    }

    /// Native (level 0) page size.
    pub fn page_size(&self) -> (u32, u32) {
        (self.manifest.page_width, self.manifest.page_height)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn file_info(&self, file: usize) -> &MipFileInfo {
        &self.files[file].info
    }

    pub fn file_state(&self, file: usize) -> FileState {
        self.files[file].state
    }

    pub fn file_priority(&self, file: usize) -> u32 {
        self.files[file].priority
    }

    /// File holding `page` at `level`.
    pub fn file_index(&self, page: usize, level: usize) -> usize {
        self.page_files[page][level]
    }

    pub fn files(&self) -> impl Iterator<Item = (&MipFileInfo, FileState)> {
        self.files.iter().map(|f| (&f.info, f.state))
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn loading_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.state == FileState::Loading)
            .count()
    }

    pub fn preload_page(&self) -> Option<usize> {
        self.preload_page
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            files: self.files.len(),
            loaded: self.loaded.len(),
            loading: self.loading_count(),
            failed: self
                .files
                .iter()
                .filter(|f| f.state == FileState::Error)
                .count(),
            fetches: self.fetches,
            evictions: self.evictions,
        }
    }

    /// Resident tiles of `page` at levels `max_level` and coarser.
    ///
    /// Never blocks. Missing levels are requested: their files are raised to
    /// the request priority and fetched by a later [`MipCache::pump`].
    ///
    /// # Panics
    /// If `page` is out of range.
    pub fn get_mip_page(&mut self, page: usize, max_level: usize) -> MipPageView {
        assert!(
            page < self.page_count(),
            "page {} out of range ({} pages)",
            page,
            self.page_count()
        );
        let level_count = self.level_count();
        let mut view = MipPageView {
            page,
            levels: vec![None; level_count],
        };

        for level in max_level.min(level_count - 1)..level_count {
            let file = self.page_files[page][level];
            let request = self.request_priority(level);
            let entry = &mut self.files[file];
            if entry.state != FileState::Error {
                entry.requested = true;
            }
            match entry.state {
                FileState::Loaded => {
                    view.levels[level] = self.pages[page].tiles[level].clone();
                    if entry.priority < request {
                        entry.priority = request;
                        self.loaded.set_priority(&file, request);
                    }
                    self.loaded.touch(&file);
                }
                FileState::Unloaded | FileState::Loading => {
                    if entry.priority < request {
                        entry.priority = request;
                    }
                    if entry.state == FileState::Unloaded {
                        self.dirty = true;
                    }
                }
                FileState::Error => {}
            }
        }
        view
    }

    fn request_priority(&self, level: usize) -> u32 {
        self.config
            .request_priority
            .saturating_add(self.coarse_bias(level))
    }

    fn coarse_bias(&self, level: usize) -> u32 {
        self.config.coarse_bias.saturating_mul(level as u32)
    }

    /// Preload priority of a file for a preload page; 0 outside every tier.
    fn preload_priority(&self, info: &MipFileInfo, page: usize) -> u32 {
        let distance = info.distance_to(page);
        self.config
            .preload_tiers
            .iter()
            .find(|tier| distance <= tier.radius)
            .map_or(0, |tier| {
                tier.priority
                    .saturating_sub(distance as u32)
                    .max(1)
                    .saturating_add(self.coarse_bias(info.level))
            })
    }

    /// Recompute every file's priority around `page`.
    pub fn set_preload_page(&mut self, page: usize) {
        assert!(
            page < self.page_count(),
            "preload page {} out of range ({} pages)",
            page,
            self.page_count()
        );
        let priorities: Vec<u32> = self
            .files
            .iter()
            .map(|f| self.preload_priority(&f.info, page))
            .collect();
        for (index, (file, priority)) in self.files.iter_mut().zip(priorities).enumerate() {
            file.priority = priority;
            file.base = priority;
            if file.state == FileState::Loaded {
                self.loaded.set_priority(&index, priority);
            }
        }
        log::debug!("Preload page set to {}", page);
        self.preload_page = Some(page);
        self.dirty = true;
    }

    /// Collect finished fetches, then start the next one if nothing is in
    /// flight. Call once per frame.
    pub fn pump(&mut self) -> Vec<CacheEvent> {
        let mut events = Vec::new();
        while let Some(outcome) = self.scheduler.poll() {
            self.complete(outcome, &mut events);
        }
        self.release_stale_requests();
        if self.dirty && self.scheduler.in_flight() == 0 && self.loading_count() == 0 {
            self.schedule(&mut events);
        }
        for file in &mut self.files {
            file.requested = false;
        }
        events
    }

    /// Drop loaded files that were not requested again back to their
    /// preload priority.
    fn release_stale_requests(&mut self) {
        for (index, file) in self.files.iter_mut().enumerate() {
            if file.state == FileState::Loaded && !file.requested && file.priority != file.base {
                log::trace!("{} back to preload priority {}", file.info.name, file.base);
                file.priority = file.base;
                self.loaded.set_priority(&index, file.base);
                self.dirty = true;
            }
        }
    }

    fn complete(&mut self, outcome: FetchOutcome, events: &mut Vec<CacheEvent>) {
        let FetchOutcome { file, path, result } = outcome;
        if self.files.get(file).map(|f| f.state) != Some(FileState::Loading) {
            log::warn!("Ignoring unexpected fetch result for {} (file {})", path, file);
            return;
        }
        self.dirty = true;

        let expected = self.files[file].info.page_count;
        let parsed = result.and_then(|bytes| {
            let tiles = parse_container(&bytes).map_err(|e| TileError::format(&path, e))?;
            if tiles.len() != expected {
                return Err(TileError::format(
                    &path,
                    ContainerError::TileCount {
                        expected,
                        found: tiles.len(),
                    },
                ));
            }
            // Tiles from an undecoded source are expanded once, here.
            tiles
                .into_iter()
                .map(Tile::decoded)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| TileError::format(&path, e))
        });

        match parsed {
            Ok(tiles) => {
                let info = &self.files[file].info;
                for (page, tile) in info.pages().zip(&tiles) {
                    self.pages[page].tiles[info.level] = Some(Arc::clone(tile));
                }
                log::debug!(
                    "Loaded {} (level {}, pages {:?})",
                    info.name,
                    info.level,
                    info.pages()
                );
                let priority = self.files[file].priority;
                self.loaded.insert(file, tiles, priority);
                self.files[file].state = FileState::Loaded;
                events.push(CacheEvent::Loaded { file });

                let cap = self.config.loaded_file_cap.max(1);
                if self.loaded.len() > cap {
                    self.evict_down_to(cap, events);
                }
            }
            Err(error) => {
                log::warn!("{}", error);
                self.files[file].state = FileState::Error;
                if let Some(callback) = self.on_error.as_mut() {
                    callback(&self.files[file].info, &error);
                }
                events.push(CacheEvent::Failed { file, error });
            }
        }
    }

    fn schedule(&mut self, events: &mut Vec<CacheEvent>) {
        self.dirty = false;
        let candidate = self
            .files
            .iter()
            .filter(|f| f.state == FileState::Unloaded && f.priority > 0)
            .max_by_key(|f| (f.priority, f.requested, std::cmp::Reverse(f.info.index)))
            .map(|f| (f.info.index, f.priority, f.requested));
        let Some((file, priority, requested)) = candidate else {
            return;
        };

        let cap = self.config.loaded_file_cap.max(1);
        if self.loaded.len() >= cap {
            // Equal priority goes to whichever was asked for more recently.
            match self.loaded.least_valuable() {
                Some((_, least)) if priority > least => {}
                Some((victim, least))
                    if priority == least && requested && !self.files[victim].requested => {}
                _ => {
                    log::trace!("File {} does not outrank the loaded set", file);
                    return;
                }
            }
            self.evict_down_to(cap - 1, events);
        }

        let path = self.files[file].info.name.clone();
        if self.scheduler.submit(FetchRequest { file, path }) {
            self.files[file].state = FileState::Loading;
            self.fetches += 1;
        } else {
            self.dirty = true;
        }
    }

    fn evict_down_to(&mut self, cap: usize, events: &mut Vec<CacheEvent>) {
        for (file, _) in self.loaded.evict_to(cap) {
            self.clear_file(file);
            events.push(CacheEvent::Evicted { file });
        }
    }

    fn clear_file(&mut self, file: usize) {
        let info = &self.files[file].info;
        for page in info.pages() {
            self.pages[page].tiles[info.level] = None;
        }
        log::debug!("Evicted {}", info.name);
        self.files[file].state = FileState::Unloaded;
        self.evictions += 1;
        self.dirty = true;
    }

    /// Force a loaded file out. Returns false if it was not loaded.
    pub fn evict_file(&mut self, file: usize) -> bool {
        if self.loaded.remove(&file).is_none() {
            return false;
        }
        self.clear_file(file);
        true
    }
}
