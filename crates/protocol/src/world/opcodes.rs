use num_enum::{IntoPrimitive, TryFromPrimitive};

/// World-protocol opcodes. Server→client opcodes go out as two bytes,
/// client→server opcodes arrive as four (the high half is always zero in
/// this era). Values are the wire contract.
#[repr(u16)]
#[derive(TryFromPrimitive, IntoPrimitive, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum OpCode {
    CmsgCharCreate = 0x036,
    CmsgCharEnum = 0x037,
    CmsgCharDelete = 0x038,
    SmsgCharCreate = 0x03A,
    SmsgCharEnum = 0x03B,
    SmsgCharDelete = 0x03C,
    CmsgPlayerLogin = 0x03D,
    CmsgLogoutRequest = 0x04B,
    SmsgLogoutComplete = 0x04D,
    CmsgNameQuery = 0x050,
    SmsgNameQueryResponse = 0x051,
    CmsgMessageChat = 0x095,
    SmsgMessageChat = 0x096,
    CmsgJoinChannel = 0x097,
    CmsgLeaveChannel = 0x098,
    SmsgChannelNotify = 0x099,
    SmsgUpdateObject = 0x0A9,
    SmsgDestroyObject = 0x0AA,
    MsgMoveStartForward = 0x0B5,
    MsgMoveStartBackward = 0x0B6,
    MsgMoveStop = 0x0B7,
    MsgMoveStartStrafeLeft = 0x0B8,
    MsgMoveStartStrafeRight = 0x0B9,
    MsgMoveStopStrafe = 0x0BA,
    MsgMoveJump = 0x0BB,
    MsgMoveStartTurnLeft = 0x0BC,
    MsgMoveStartTurnRight = 0x0BD,
    MsgMoveStopTurn = 0x0BE,
    MsgMoveSetFacing = 0x0DA,
    MsgMoveWorldportAck = 0x0DC,
    MsgMoveHeartbeat = 0x0EE,
    CmsgPing = 0x1DC,
    SmsgPong = 0x1DD,
    SmsgAuthChallenge = 0x1EC,
    CmsgAuthSession = 0x1ED,
    SmsgAuthResponse = 0x1EE,
    SmsgLoginVerifyWorld = 0x236,
}

impl OpCode {
    /// Whether this opcode belongs to the movement family the world
    /// session forwards to nearby players.
    pub fn is_movement(self) -> bool {
        matches!(
            self,
            OpCode::MsgMoveStartForward
                | OpCode::MsgMoveStartBackward
                | OpCode::MsgMoveStop
                | OpCode::MsgMoveStartStrafeLeft
                | OpCode::MsgMoveStartStrafeRight
                | OpCode::MsgMoveStopStrafe
                | OpCode::MsgMoveJump
                | OpCode::MsgMoveStartTurnLeft
                | OpCode::MsgMoveStartTurnRight
                | OpCode::MsgMoveStopTurn
                | OpCode::MsgMoveSetFacing
                | OpCode::MsgMoveHeartbeat
        )
    }
}
