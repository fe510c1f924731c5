use crate::boxes::prelude::*;

def_box! {
    /// 8.1.1 Media Data Box (ISO/IEC 14496-12:2015(E))
    ///
    /// Only used for fragments, which are assembled in memory. The big
    /// mdat of a progressive file is streamed straight to the sink
    /// behind a placeholder header (see the muxer).
    #[derive(Default)]
    MediaDataBox {
        data:   Data,
    },
    fourcc => b"mdat",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}
