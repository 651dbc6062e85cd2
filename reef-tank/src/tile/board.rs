//! Tile registry
//!
//! Tiles that name the same source share one [`AudioNode`]: the first tile
//! creates it, every later one is attached as an extra pointer.

use crate::error::{Error, Result};
use crate::tile::element::{MirrorElement, TileElement};
use crate::tile::node::{AudioNode, NodeContext};
use reef_common::config::TileConfig;
use reef_common::events::{ElementSnapshot, TileStatus};
use reef_common::volume;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One tile as the API reports it
#[derive(Debug, Clone, Serialize)]
pub struct TileView {
    pub element: ElementSnapshot,
    pub status: TileStatus,
}

pub struct TileBoard {
    ctx: NodeContext,
    /// Nodes in creation order
    nodes: Vec<Arc<AudioNode>>,
    by_src: HashMap<String, usize>,
    /// Element id -> (element, index into `nodes`)
    by_element: HashMap<String, (Arc<dyn TileElement>, usize)>,
    /// Element ids in registration order
    order: Vec<String>,
}

impl TileBoard {
    pub fn new(ctx: NodeContext) -> Self {
        Self {
            ctx,
            nodes: Vec::new(),
            by_src: HashMap::new(),
            by_element: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Build a board with one mirror element per configured tile
    pub fn from_config(ctx: NodeContext, tiles: &[TileConfig]) -> Result<Self> {
        let mut board = Self::new(ctx);
        for tile in tiles {
            let volume = tile.volume.unwrap_or(board.ctx.settings.default_volume);
            let mut element =
                MirrorElement::new(&tile.id, tile.label.clone(), volume::slider_from_gain(volume));
            if let Some(events) = &board.ctx.events {
                element = element.with_events(events.clone());
            }
            board.add_tile(tile, Arc::new(element))?;
        }
        info!(
            "Tile board: {} tile(s), {} audio node(s)",
            board.order.len(),
            board.nodes.len()
        );
        Ok(board)
    }

    /// Bind `element` to the node for `tile.src`, creating the node on first use
    pub fn add_tile(
        &mut self,
        tile: &TileConfig,
        element: Arc<dyn TileElement>,
    ) -> Result<Arc<AudioNode>> {
        let id = element.id().to_string();
        if self.by_element.contains_key(&id) {
            return Err(Error::Tile(format!("duplicate tile id '{}'", id)));
        }

        let index = match self.by_src.get(&tile.src) {
            Some(&index) => {
                self.nodes[index].add_pointer(Arc::clone(&element));
                debug!("Tile {} attached to {}", id, tile.src);
                index
            }
            None => {
                let node = Arc::new(AudioNode::new(
                    tile.src.clone(),
                    Arc::clone(&element),
                    self.ctx.clone(),
                ));
                self.nodes.push(node);
                let index = self.nodes.len() - 1;
                self.by_src.insert(tile.src.clone(), index);
                debug!("Tile {} created node for {}", id, tile.src);
                index
            }
        };

        if let Some(volume) = tile.volume {
            self.nodes[index].adjust_volume(volume, None);
        }

        self.by_element.insert(id.clone(), (element, index));
        self.order.push(id);
        Ok(Arc::clone(&self.nodes[index]))
    }

    /// Node and element for a tile id
    pub fn get(&self, id: &str) -> Option<(Arc<dyn TileElement>, Arc<AudioNode>)> {
        self.by_element
            .get(id)
            .map(|(element, index)| (Arc::clone(element), Arc::clone(&self.nodes[*index])))
    }

    pub fn node_for_src(&self, src: &str) -> Option<Arc<AudioNode>> {
        self.by_src.get(src).map(|&i| Arc::clone(&self.nodes[i]))
    }

    pub fn nodes(&self) -> &[Arc<AudioNode>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Every tile in registration order
    pub fn views(&self) -> Vec<TileView> {
        self.order
            .iter()
            .filter_map(|id| self.view(id))
            .collect()
    }

    pub fn view(&self, id: &str) -> Option<TileView> {
        let (element, index) = self.by_element.get(id)?;
        Some(TileView {
            element: element.snapshot(),
            status: self.nodes[*index].status(),
        })
    }

    /// Tear down every node
    pub fn shutdown_all(&self) {
        for node in &self.nodes {
            node.shutdown();
        }
        info!("Tile board shut down ({} node(s))", self.nodes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::graph::AudioContext;
    use crate::tile::node::NodeSettings;
    use crate::transport::FileTransport;

    fn ctx() -> NodeContext {
        NodeContext {
            audio: Arc::new(AudioContext::new(8000)),
            transport: Arc::new(FileTransport::new(std::env::temp_dir())),
            settings: NodeSettings::default(),
            events: None,
        }
    }

    fn tile(id: &str, src: &str, volume: Option<f32>) -> TileConfig {
        TileConfig {
            id: id.to_string(),
            src: src.to_string(),
            label: None,
            volume,
        }
    }

    #[test]
    fn test_tiles_sharing_a_source_share_a_node() {
        let board = TileBoard::from_config(
            ctx(),
            &[
                tile("rain", "rain.ogg", None),
                tile("rain-footer", "rain.ogg", None),
                tile("waves", "waves.ogg", Some(0.8)),
            ],
        )
        .unwrap();

        assert_eq!(board.len(), 3);
        assert_eq!(board.nodes().len(), 2);

        let (_, first) = board.get("rain").unwrap();
        let (_, second) = board.get("rain-footer").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.status().pointers, 2);

        let waves = board.node_for_src("waves.ogg").unwrap();
        assert_eq!(waves.volume(), 0.8);
        assert_eq!(first.volume(), 0.25);
    }

    #[test]
    fn test_configured_volume_sets_the_slider() {
        let board = TileBoard::from_config(ctx(), &[tile("waves", "waves.ogg", Some(0.125))]).unwrap();
        let view = board.view("waves").unwrap();
        assert!((view.element.slider_value - 50.0).abs() < 1e-6);
        assert_eq!(view.status.volume, 0.125);
    }

    #[test]
    fn test_duplicate_element_id_rejected() {
        let mut board = TileBoard::new(ctx());
        let config = tile("rain", "rain.ogg", None);
        board
            .add_tile(&config, Arc::new(MirrorElement::new("rain", None, 0.0)))
            .unwrap();

        let result = board.add_tile(&config, Arc::new(MirrorElement::new("rain", None, 0.0)));
        assert!(matches!(result, Err(Error::Tile(_))));
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_views_follow_registration_order() {
        let board = TileBoard::from_config(
            ctx(),
            &[tile("b", "b.ogg", None), tile("a", "a.ogg", None)],
        )
        .unwrap();
        let ids: Vec<String> = board.views().into_iter().map(|v| v.element.id).collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
        assert!(board.view("missing").is_none());
    }
}
