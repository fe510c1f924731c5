use crate::boxes::prelude::*;
use crate::boxes::{MovieExtendsBox, MovieHeaderBox, TrackBox, UserDataBox};

def_box! {
    /// 8.2.1 Movie Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MovieBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"moov",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl MovieBox {
    declare_box_methods!(MovieHeaderBox, movie_header, movie_header_mut);
    declare_box_methods_opt!(MovieExtendsBox, movie_extends, movie_extends_mut);
    declare_box_methods_opt!(UserDataBox, user_data, user_data_mut);

    /// Get a list of all tracks.
    pub fn tracks(&self) -> Vec<&TrackBox> {
        iter_box!(self, TrackBox).collect()
    }

    /// Get a list of all tracks, mutable.
    pub fn tracks_mut(&mut self) -> Vec<&mut TrackBox> {
        iter_box_mut!(self, TrackBox).collect()
    }

    /// Number of tracks.
    pub fn track_count(&self) -> usize {
        iter_box!(self, TrackBox).count()
    }

    /// Look up a track by id (the id from the track header).
    pub fn track_by_id(&self, id: u32) -> Option<&TrackBox> {
        iter_box!(self, TrackBox).find(|t| t.track_id() == id)
    }

    /// Look up a track by id, mutable.
    pub fn track_by_id_mut(&mut self, id: u32) -> Option<&mut TrackBox> {
        iter_box_mut!(self, TrackBox).find(|t| t.track_id() == id)
    }

    /// Check if this box is valid.
    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        if first_box!(&self.boxes, MovieHeaderBox).is_none() {
            log::error!("MovieBox: no MovieHeaderBox present");
            valid = false;
        }
        if self.track_count() == 0 {
            log::error!("MovieBox: no TrackBoxes present");
            valid = false;
        }
        for track in self.tracks() {
            if !track.is_valid() {
                valid = false;
            }
        }
        valid
    }
}
